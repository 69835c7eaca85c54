pub mod animal_handlers;
pub mod health_handlers;
pub mod image_handlers;
pub mod object_handlers;
