use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while compiling a policy. Evaluation itself never fails.
#[derive(Debug, Error, Diagnostic)]
pub enum AuthorizeError {
    #[error("Failed to load policy file `{path}`")]
    #[diagnostic(
        code(attrgate::authorize::policy_load),
        help("Check that `policy.path` points at a readable JSON file")
    )]
    PolicyLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Policy file is not valid JSON: {0}")]
    #[diagnostic(
        code(attrgate::authorize::json),
        help("The policy must be a single JSON object mapping option and attribute names to values")
    )]
    Json(#[from] serde_json::Error),

    #[error("Policy must be a JSON object, found {0}")]
    #[diagnostic(code(attrgate::authorize::not_an_object))]
    NotAnObject(String),

    #[error("Key `{0}` appears more than once in the policy")]
    #[diagnostic(
        code(attrgate::authorize::duplicate_key),
        help("List several rules for one attribute as an array: \"uid\": [{{ \"patterns\": ..., \"spEntityIDs\": [...] }}, ...]")
    )]
    DuplicateKey(String),

    #[error("Attribute values is neither string nor array: `{attribute}`")]
    #[diagnostic(
        code(attrgate::authorize::invalid_attribute_value_type),
        help("A rule is a string, an array of strings, {{ \"patterns\": [...], \"spEntityIDs\": [...] }}, or an array of such objects")
    )]
    InvalidAttributeValueType { attribute: String },

    #[error("Each value should be a string for attribute `{attribute}`, found {value}")]
    #[diagnostic(code(attrgate::authorize::invalid_pattern_value_type))]
    InvalidPatternValueType { attribute: String, value: String },

    #[error("Invalid pattern `{pattern}` for attribute `{attribute}`: {reason}")]
    #[diagnostic(
        code(attrgate::authorize::invalid_pattern),
        help("Regex patterns need delimiters, e.g. \"/^.*@example\\.com$/i\". Set \"regex\": false to compare literally")
    )]
    InvalidPattern {
        attribute: String,
        pattern: String,
        reason: String,
    },

    #[error("`spEntityIDs` for attribute `{attribute}` must be an array of strings")]
    #[diagnostic(code(attrgate::authorize::invalid_relying_parties))]
    InvalidRelyingParties { attribute: String },

    #[error("Rule for attribute `{0}` has no patterns")]
    #[diagnostic(
        code(attrgate::authorize::empty_rule),
        help("Every rule needs a non-empty attribute name and at least one pattern")
    )]
    EmptyRule(String),

    #[error("`reject_msg` entry for language `{0}` is not a string")]
    #[diagnostic(code(attrgate::authorize::invalid_reject_msg))]
    InvalidRejectMessage(String),
}
