pub mod books;
pub mod users;

use bookstore_kernel::ModuleRegistry;

/// Register the framework core and every application module
pub fn register_all(registry: &mut ModuleRegistry) {
    registry.register_core(bookstore_authz::create_module());
    registry.register_custom(users::create_module());
    registry.register_custom(books::create_module());
}
