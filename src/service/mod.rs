//! CrudService: generic row operations over registered models.

mod crud;
pub use crud::CrudService;
