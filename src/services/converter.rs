//! 作业参数转换
//! 属性表 <-> 带类型的 JobParameters

use chrono::NaiveDate;
use thiserror::Error;

use crate::error::JobServiceError;
use crate::models::job::{JobParameter, JobParameters, DATE_FORMAT};
use crate::services::properties::Properties;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("unknown parameter type '{kind}' for key '{key}'")]
    UnknownType { key: String, kind: String },

    #[error("invalid {kind} value '{value}' for key '{key}'")]
    InvalidValue {
        key: String,
        kind: &'static str,
        value: String,
    },
}

impl From<ConversionError> for JobServiceError {
    fn from(e: ConversionError) -> Self {
        JobServiceError::JobParametersInvalid(e.to_string())
    }
}

/// 参数转换器
pub trait JobParametersConverter: Send + Sync {
    fn job_parameters(&self, properties: &Properties) -> Result<JobParameters, ConversionError>;

    fn properties(&self, parameters: &JobParameters) -> Properties;
}

/// 默认转换器
///
/// 键写作 `name(type)`，type 取 string/long/double/date（大小写不敏感），
/// 不带类型的键按字符串处理；日期格式为 `yyyy/MM/dd`。
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultJobParametersConverter;

impl JobParametersConverter for DefaultJobParametersConverter {
    fn job_parameters(&self, properties: &Properties) -> Result<JobParameters, ConversionError> {
        let mut parameters = JobParameters::new();

        for (raw_key, value) in properties {
            let (name, kind) = split_typed_key(raw_key);
            let parameter = match kind.map(str::to_ascii_lowercase).as_deref() {
                None | Some("string") => JobParameter::String(value.clone()),
                Some("long") => JobParameter::Long(value.trim().parse().map_err(|_| {
                    ConversionError::InvalidValue {
                        key: name.to_string(),
                        kind: "long",
                        value: value.clone(),
                    }
                })?),
                Some("double") => JobParameter::Double(value.trim().parse().map_err(|_| {
                    ConversionError::InvalidValue {
                        key: name.to_string(),
                        kind: "double",
                        value: value.clone(),
                    }
                })?),
                Some("date") => JobParameter::Date(
                    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
                        ConversionError::InvalidValue {
                            key: name.to_string(),
                            kind: "date",
                            value: value.clone(),
                        }
                    })?,
                ),
                Some(other) => {
                    return Err(ConversionError::UnknownType {
                        key: name.to_string(),
                        kind: other.to_string(),
                    })
                }
            };
            parameters.insert(name, parameter);
        }

        Ok(parameters)
    }

    fn properties(&self, parameters: &JobParameters) -> Properties {
        parameters
            .iter()
            .map(|(name, value)| {
                let key = match value {
                    JobParameter::String(_) => name.clone(),
                    typed => format!("{}({})", name, typed.type_name()),
                };
                (key, value.to_string())
            })
            .collect()
    }
}

/// `name(type)` -> (`name`, Some(`type`))
fn split_typed_key(key: &str) -> (&str, Option<&str>) {
    let key = key.trim();
    if let Some(stripped) = key.strip_suffix(')') {
        if let Some(open) = stripped.rfind('(') {
            return (&stripped[..open], Some(&stripped[open + 1..]));
        }
    }
    (key, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::properties::string_to_properties;

    #[test]
    fn test_typed_keys() {
        let properties = string_to_properties(
            "input=a.csv,run.id(long)=3,rate(double)=0.5,when(DATE)=2010/03/07",
        );
        let parameters = DefaultJobParametersConverter
            .job_parameters(&properties)
            .unwrap();

        assert_eq!(parameters.get("input"), Some(&JobParameter::String("a.csv".into())));
        assert_eq!(parameters.get("run.id"), Some(&JobParameter::Long(3)));
        assert_eq!(parameters.get("rate"), Some(&JobParameter::Double(0.5)));
        assert_eq!(
            parameters.get("when"),
            Some(&JobParameter::Date(NaiveDate::from_ymd_opt(2010, 3, 7).unwrap()))
        );
    }

    #[test]
    fn test_explicit_string_type() {
        let properties = string_to_properties("code(string)=007");
        let parameters = DefaultJobParametersConverter
            .job_parameters(&properties)
            .unwrap();
        assert_eq!(parameters.get("code"), Some(&JobParameter::String("007".into())));
    }

    #[test]
    fn test_invalid_values() {
        let converter = DefaultJobParametersConverter;
        let long = converter.job_parameters(&string_to_properties("n(long)=abc"));
        assert!(matches!(long, Err(ConversionError::InvalidValue { kind: "long", .. })));

        let date = converter.job_parameters(&string_to_properties("d(date)=2010-03-07"));
        assert!(matches!(date, Err(ConversionError::InvalidValue { kind: "date", .. })));

        let unknown = converter.job_parameters(&string_to_properties("x(uuid)=1"));
        assert!(matches!(unknown, Err(ConversionError::UnknownType { .. })));
    }

    #[test]
    fn test_conversion_error_maps_to_invalid_parameters() {
        let error: JobServiceError = ConversionError::UnknownType {
            key: "x".into(),
            kind: "uuid".into(),
        }
        .into();
        assert_eq!(error.code(), "job.parameters.invalid");
    }

    #[test]
    fn test_properties_are_inverse() {
        let converter = DefaultJobParametersConverter;
        let parameters = JobParameters::new()
            .with("input", JobParameter::String("a.csv".into()))
            .with("run.id", JobParameter::Long(4))
            .with(
                "when",
                JobParameter::Date(NaiveDate::from_ymd_opt(2010, 12, 1).unwrap()),
            );

        let properties = converter.properties(&parameters);
        assert_eq!(properties["input"], "a.csv");
        assert_eq!(properties["run.id(long)"], "4");
        assert_eq!(properties["when(date)"], "2010/12/01");

        assert_eq!(converter.job_parameters(&properties).unwrap(), parameters);
    }
}
