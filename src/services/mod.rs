pub mod image;

pub mod identity_cognito;
pub mod identity_service;
pub mod identity_service_impl;
pub use identity_cognito::CognitoIdentityService;
pub use identity_service::{
    IdentityError, IdentityProvider, RefreshRequest, SigninRequest, SignupRequest, SignupResult,
};
pub use identity_service_impl::LocalIdentityService;

pub mod storage;
pub mod storage_local;
pub mod storage_object;
pub use storage::{PhotoStorage, StorageError};
pub use storage_local::LocalPhotoStorage;
pub use storage_object::ObjectPhotoStorage;

pub mod photo_service;
pub mod photo_service_impl;
pub use photo_service::{FileMode, PhotoContent, PhotoError, PhotoService, UploadPhoto};
pub use photo_service_impl::SeaOrmPhotoService;
