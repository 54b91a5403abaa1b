//! 请求和响应的数据传输对象

pub mod request;
pub mod response;

pub use request::{
    CreateNotificationRequest, ModerateRequest, ReportQuery, ReviewReportRequest, ScheduleRequest,
    UpdateNotificationRequest,
};

pub use response::{ApiResponse, DeletedResponse, SendResponse};
