pub mod cognito;
pub mod geocoding;
