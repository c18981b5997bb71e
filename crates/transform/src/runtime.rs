//! Runtime classification.
//!
//! Every supported Lambda runtime is a variant of [`Runtime`] and every
//! mapping (family, version, layer name) is an exhaustive `match`, so adding a
//! runtime without wiring its layer is a compile error rather than a silent
//! fall-through to [`RuntimeType::Other`].

use std::fmt;

/// Runtime family, which decides the instrumentation layer to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeType {
    Node,
    Python,
    /// Not instrumented (custom runtimes, Java, container images, ...)
    Other,
}

impl RuntimeType {
    /// Human-readable family name used in messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Node => "Node.js",
            Self::Python => "Python",
            Self::Other => "unsupported",
        }
    }

    /// Option that carries this family's layer version.
    pub fn layer_version_param(&self) -> Option<&'static str> {
        match self {
            Self::Node => Some("nodeLayerVersion"),
            Self::Python => Some("pythonLayerVersion"),
            Self::Other => None,
        }
    }

    /// Whether functions of this family get layers, tracing and environment.
    pub fn is_instrumented(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A supported Lambda runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Runtime {
    Nodejs12,
    Nodejs14,
    Nodejs16,
    Nodejs18,
    Nodejs20,
    Nodejs22,
    Python37,
    Python38,
    Python39,
    Python310,
    Python311,
    Python312,
    Python313,
}

impl Runtime {
    /// Every supported runtime.
    pub const ALL: [Runtime; 13] = [
        Runtime::Nodejs12,
        Runtime::Nodejs14,
        Runtime::Nodejs16,
        Runtime::Nodejs18,
        Runtime::Nodejs20,
        Runtime::Nodejs22,
        Runtime::Python37,
        Runtime::Python38,
        Runtime::Python39,
        Runtime::Python310,
        Runtime::Python311,
        Runtime::Python312,
        Runtime::Python313,
    ];

    /// Parse a Lambda runtime identifier such as `nodejs18.x`.
    pub fn parse(identifier: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.identifier() == identifier.trim())
    }

    /// The identifier Lambda uses for this runtime.
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::Nodejs12 => "nodejs12.x",
            Self::Nodejs14 => "nodejs14.x",
            Self::Nodejs16 => "nodejs16.x",
            Self::Nodejs18 => "nodejs18.x",
            Self::Nodejs20 => "nodejs20.x",
            Self::Nodejs22 => "nodejs22.x",
            Self::Python37 => "python3.7",
            Self::Python38 => "python3.8",
            Self::Python39 => "python3.9",
            Self::Python310 => "python3.10",
            Self::Python311 => "python3.11",
            Self::Python312 => "python3.12",
            Self::Python313 => "python3.13",
        }
    }

    /// Runtime family.
    pub fn runtime_type(&self) -> RuntimeType {
        match self {
            Self::Nodejs12
            | Self::Nodejs14
            | Self::Nodejs16
            | Self::Nodejs18
            | Self::Nodejs20
            | Self::Nodejs22 => RuntimeType::Node,
            Self::Python37
            | Self::Python38
            | Self::Python39
            | Self::Python310
            | Self::Python311
            | Self::Python312
            | Self::Python313 => RuntimeType::Python,
        }
    }

    /// Language version within the family.
    pub fn version(&self) -> &'static str {
        match self {
            Self::Nodejs12 => "12.x",
            Self::Nodejs14 => "14.x",
            Self::Nodejs16 => "16.x",
            Self::Nodejs18 => "18.x",
            Self::Nodejs20 => "20.x",
            Self::Nodejs22 => "22.x",
            Self::Python37 => "3.7",
            Self::Python38 => "3.8",
            Self::Python39 => "3.9",
            Self::Python310 => "3.10",
            Self::Python311 => "3.11",
            Self::Python312 => "3.12",
            Self::Python313 => "3.13",
        }
    }

    /// Name of the instrumentation layer published for this runtime.
    pub fn layer_name(&self) -> &'static str {
        match self {
            Self::Nodejs12 => "Datadog-Node12-x",
            Self::Nodejs14 => "Datadog-Node14-x",
            Self::Nodejs16 => "Datadog-Node16-x",
            Self::Nodejs18 => "Datadog-Node18-x",
            Self::Nodejs20 => "Datadog-Node20-x",
            Self::Nodejs22 => "Datadog-Node22-x",
            Self::Python37 => "Datadog-Python37",
            Self::Python38 => "Datadog-Python38",
            Self::Python39 => "Datadog-Python39",
            Self::Python310 => "Datadog-Python310",
            Self::Python311 => "Datadog-Python311",
            Self::Python312 => "Datadog-Python312",
            Self::Python313 => "Datadog-Python313",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Classify a raw runtime string into `(family, version)`.
///
/// Absent or unrecognized runtimes classify as [`RuntimeType::Other`] with the
/// raw string (or an empty string) as version.
pub fn classify(raw: Option<&str>) -> (RuntimeType, String) {
    match raw.and_then(Runtime::parse) {
        Some(runtime) => (runtime.runtime_type(), runtime.version().to_string()),
        None => (RuntimeType::Other, raw.unwrap_or_default().to_string()),
    }
}
