pub mod http;
pub mod sdk;

pub use http::BedrockHttpInvoker;
pub use sdk::BedrockSdkInvoker;
