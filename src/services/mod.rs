pub mod permission;

pub use permission::{
    HttpPermissionChecker, PermissionAnswer, PermissionChecker, PermissionError, PermissionQuery,
};
