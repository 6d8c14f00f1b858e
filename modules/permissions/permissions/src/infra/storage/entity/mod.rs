pub mod content_type_permission;
pub mod resource_permission;
pub mod tenant_permission;
