pub mod attribute;
pub mod delivery_mode;
pub mod story;
pub mod subscriber;
pub mod subscriber_email;
pub mod subscriber_name;
pub mod subscriber_status;
pub mod subscription_request;
