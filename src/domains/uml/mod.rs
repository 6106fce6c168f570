pub mod uml_command_log;
pub mod uml_commands;
pub mod uml_controllers;
pub mod uml_document;
pub mod uml_models;
pub mod uml_project;
pub mod uml_serde;
