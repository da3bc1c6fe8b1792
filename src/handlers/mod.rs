pub mod health;
pub mod mock;

pub use health::{health_check, HealthResponse};
pub use mock::{
    delete_mock, get_mock, post_mock, put_mock, MockErrorResponse, MockPath, MockQuery,
    MOCK_SOURCE_HEADER,
};
