use crate::access::RgAccess;

/// 构建与编译渲染图时的使用错误，全部属于配置错误
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RgError {
    #[error("pass `{pass}` declares resource `{resource}` which was never attached")]
    MissingAttachment { pass: String, resource: String },

    #[error("resource `{resource}` is attached more than once")]
    DuplicateAttachment { resource: String },

    #[error("pass `{pass}` declares resource `{resource}` more than once")]
    DuplicateDeclaration { pass: String, resource: String },

    #[error("pass `{pass}` is registered more than once")]
    DuplicatePass { pass: String },

    #[error("`{resource}` cannot be accessed as {access} in {context}")]
    InvalidAccess {
        context: String,
        resource: String,
        access: RgAccess,
    },

    #[error("pass `{pass}` is ordered after unknown pass `{after}`")]
    UnknownOrderingHint { pass: String, after: String },

    #[error("render graph has a dependency cycle among passes {passes:?}")]
    Cycle { passes: Vec<String> },
}
