//! ACR Sample CLI - provisions an Azure Container Registry and moves an
//! image through it with Docker.

pub mod commands;
pub mod output;
