//! 数据模型模块
//! 领域模型（作业、实例、执行）、请求参数与面向视图的只读包装

pub mod job;
pub mod pagination;
pub mod request;
pub mod view;
