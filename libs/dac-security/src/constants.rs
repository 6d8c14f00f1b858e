/// Role claim that triggers the administrator bypass unless configured otherwise.
pub const DEFAULT_ADMIN_ROLE: &str = "admin";
