//! 批处理作业管理控制台
//! 列出作业、查看作业实例与执行、启动作业

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod telemetry;
pub mod views;
