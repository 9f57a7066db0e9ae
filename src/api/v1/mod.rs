/*
 * Responsibility
 * - v1 backend wire format (request/response DTO)
 */
pub mod dto;
