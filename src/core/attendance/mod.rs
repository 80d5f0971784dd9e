//! Attendance recording and reporting

pub mod api;
pub mod calendar;
pub mod service;

pub use api::{AttendanceApiState, attendance_api_router};
pub use calendar::{CheckInPolicy, DEFAULT_SERVICE_START_HOUR, DEFAULT_TIMEZONE};
pub use service::{
    AttendanceAnalytics, AttendanceError, AttendanceHistory, AttendanceRecord, AttendanceService,
    HistoryQuery,
};
