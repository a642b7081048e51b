//! Block registry: the closed set of block kinds the editor offers, with the
//! parameter schema, value domains and defaults of each.
//!
//! The registry is static data. [`lookup`] maps an editor type string to its
//! [`BlockSpec`], returning [`RegistryEntry::Unrecognized`] for anything
//! else so that callers can keep unknown blocks around as inert placeholders
//! instead of failing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Kinds and families
// ---------------------------------------------------------------------------

/// Every block kind the registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    #[serde(rename = "inputBlock")]
    Input,
    #[serde(rename = "hiddenBlock")]
    Hidden,
    #[serde(rename = "outputBlock")]
    Output,
    #[serde(rename = "convolutionalBlock", alias = "convBlock")]
    Convolutional,
    #[serde(rename = "poolingBlock")]
    Pooling,
    #[serde(rename = "classifierBlock", alias = "classifierBlocks")]
    Classifier,
    #[serde(rename = "trainingBlock")]
    Training,
    #[serde(rename = "startBlock")]
    Start,
}

/// Structural family. Sequence indices are numbered independently per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Fully connected layers: Input, Hidden, Output.
    Neural,
    /// Feature extraction layers: Convolutional, Pooling.
    Spatial,
}

impl BlockKind {
    pub const ALL: [BlockKind; 8] = [
        BlockKind::Input,
        BlockKind::Hidden,
        BlockKind::Output,
        BlockKind::Convolutional,
        BlockKind::Pooling,
        BlockKind::Classifier,
        BlockKind::Training,
        BlockKind::Start,
    ];

    /// The editor's type string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Input => "inputBlock",
            BlockKind::Hidden => "hiddenBlock",
            BlockKind::Output => "outputBlock",
            BlockKind::Convolutional => "convolutionalBlock",
            BlockKind::Pooling => "poolingBlock",
            BlockKind::Classifier => "classifierBlock",
            BlockKind::Training => "trainingBlock",
            BlockKind::Start => "startBlock",
        }
    }

    /// Parses an editor type string, accepting legacy aliases.
    pub fn from_wire(s: &str) -> Option<BlockKind> {
        match s {
            "inputBlock" => Some(BlockKind::Input),
            "hiddenBlock" => Some(BlockKind::Hidden),
            "outputBlock" => Some(BlockKind::Output),
            "convolutionalBlock" | "convBlock" => Some(BlockKind::Convolutional),
            "poolingBlock" => Some(BlockKind::Pooling),
            "classifierBlock" | "classifierBlocks" => Some(BlockKind::Classifier),
            "trainingBlock" => Some(BlockKind::Training),
            "startBlock" => Some(BlockKind::Start),
            _ => None,
        }
    }

    pub fn family(&self) -> Option<Family> {
        match self {
            BlockKind::Input | BlockKind::Hidden | BlockKind::Output => Some(Family::Neural),
            BlockKind::Convolutional | BlockKind::Pooling => Some(Family::Spatial),
            BlockKind::Classifier | BlockKind::Training | BlockKind::Start => None,
        }
    }

    /// Whether the block becomes a layer in the compiled model. Control
    /// blocks (Start, Training, Classifier) only shape traversal.
    pub fn is_layer(&self) -> bool {
        self.family().is_some()
    }

    /// Prefix used when generating block ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            BlockKind::Input => "input",
            BlockKind::Hidden => "hidden",
            BlockKind::Output => "output",
            BlockKind::Convolutional => "conv",
            BlockKind::Pooling => "pool",
            BlockKind::Classifier => "classifier",
            BlockKind::Training => "training",
            BlockKind::Start => "start",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Parameter values and domains
// ---------------------------------------------------------------------------

/// A parameter value as it arrives from the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(u64),
    Float(f64),
    Text(String),
    Names(Vec<String>),
}

impl ParamValue {
    /// Integral value that fits a `u32`. Whole floats are accepted since the
    /// editor's number inputs do not distinguish them.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ParamValue::Int(n) => u32::try_from(*n).ok(),
            ParamValue::Float(x) if x.is_finite() && x.fract() == 0.0 && *x >= 0.0 => {
                if *x <= u32::MAX as f64 {
                    Some(*x as u32)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(n) => Some(*n as f64),
            ParamValue::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_names(&self) -> Option<&[String]> {
        match self {
            ParamValue::Names(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(n) => write!(f, "{}", n),
            ParamValue::Float(x) => write!(f, "{}", x),
            ParamValue::Text(s) => write!(f, "'{}'", s),
            ParamValue::Names(v) => write!(f, "[{}]", v.join(", ")),
        }
    }
}

impl From<u32> for ParamValue {
    fn from(n: u32) -> Self {
        ParamValue::Int(n as u64)
    }
}

impl From<f64> for ParamValue {
    fn from(x: f64) -> Self {
        ParamValue::Float(x)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

/// Set of values a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "camelCase")]
pub enum ParamDomain {
    /// Integer >= 1.
    PositiveInt,
    /// Integer >= 0.
    NonNegativeInt,
    /// Finite number > 0.
    PositiveFloat,
    /// Finite number strictly between 0 and 1.
    Fraction,
    /// One of a fixed set of names.
    Choice(&'static [&'static str]),
    Flag,
    /// List of free-form names.
    Names,
}

/// Default value of a parameter, in a form that fits in static data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamDefault {
    Int(u32),
    Float(f64),
    Text(&'static str),
    Bool(bool),
    NoNames,
}

impl ParamDefault {
    pub fn to_value(&self) -> ParamValue {
        match *self {
            ParamDefault::Int(n) => ParamValue::from(n),
            ParamDefault::Float(x) => ParamValue::Float(x),
            ParamDefault::Text(s) => ParamValue::from(s),
            ParamDefault::Bool(b) => ParamValue::Bool(b),
            ParamDefault::NoNames => ParamValue::Names(Vec::new()),
        }
    }
}

/// Schema entry for one parameter of a block kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    pub name: &'static str,
    pub domain: ParamDomain,
    pub default: ParamDefault,
    /// `false` for values owned by shape propagation.
    pub editable: bool,
}

impl ParamSpec {
    /// Checks `value` against the domain, rejecting zero or negative
    /// dimensions and non-finite numbers.
    pub fn check(&self, value: &ParamValue) -> Result<(), CoreError> {
        let invalid = |reason: String| CoreError::InvalidParameterValue {
            param: self.name.to_string(),
            reason,
        };
        match self.domain {
            ParamDomain::PositiveInt => match value.as_u32() {
                Some(n) if n >= 1 => Ok(()),
                _ => Err(invalid(format!("expected a positive integer, got {}", value))),
            },
            ParamDomain::NonNegativeInt => match value.as_u32() {
                Some(_) => Ok(()),
                None => Err(invalid(format!(
                    "expected a non-negative integer, got {}",
                    value
                ))),
            },
            ParamDomain::PositiveFloat => match value.as_f64() {
                Some(x) if x.is_finite() && x > 0.0 => Ok(()),
                _ => Err(invalid(format!("expected a positive number, got {}", value))),
            },
            ParamDomain::Fraction => match value.as_f64() {
                Some(x) if x.is_finite() && x > 0.0 && x < 1.0 => Ok(()),
                _ => Err(invalid(format!(
                    "expected a number between 0 and 1, got {}",
                    value
                ))),
            },
            ParamDomain::Choice(options) => match value.as_str() {
                Some(s) if options.contains(&s) => Ok(()),
                _ => Err(invalid(format!(
                    "expected one of [{}], got {}",
                    options.join(", "),
                    value
                ))),
            },
            ParamDomain::Flag => match value.as_bool() {
                Some(_) => Ok(()),
                None => Err(invalid(format!("expected a boolean, got {}", value))),
            },
            ParamDomain::Names => match value.as_names() {
                Some(names) if names.iter().all(|n| !n.trim().is_empty()) => Ok(()),
                Some(_) => Err(invalid("class names must not be empty".to_string())),
                None => Err(invalid(format!("expected a list of names, got {}", value))),
            },
        }
    }
}

/// Registry entry describing one block kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSpec {
    pub kind: BlockKind,
    pub label: &'static str,
    pub family: Option<Family>,
    pub is_layer: bool,
    pub params: &'static [ParamSpec],
}

impl BlockSpec {
    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Result of looking up an editor type string.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEntry {
    Known(&'static BlockSpec),
    /// Sentinel for kinds the registry does not define.
    Unrecognized { kind: String },
}

impl RegistryEntry {
    pub fn spec(&self) -> Option<&'static BlockSpec> {
        match self {
            RegistryEntry::Known(spec) => Some(spec),
            RegistryEntry::Unrecognized { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Static schema
// ---------------------------------------------------------------------------

pub const ACTIVATIONS: &[&str] = &["relu", "sigmoid", "tanh", "softmax", "linear"];
pub const POOL_TYPES: &[&str] = &["max", "avg"];
pub const OPTIMIZERS: &[&str] = &["adam", "sgd", "rmsprop", "adagrad"];

const fn size(name: &'static str, default: u32) -> ParamSpec {
    ParamSpec {
        name,
        domain: ParamDomain::PositiveInt,
        default: ParamDefault::Int(default),
        editable: true,
    }
}

const INPUT_PARAMS: &[ParamSpec] = &[size("sizeIn", 12), size("sizeOut", 12)];

const HIDDEN_PARAMS: &[ParamSpec] = &[
    size("sizeIn", 12),
    size("sizeOut", 8),
    ParamSpec {
        name: "activation",
        domain: ParamDomain::Choice(ACTIVATIONS),
        default: ParamDefault::Text("relu"),
        editable: true,
    },
];

const OUTPUT_PARAMS: &[ParamSpec] = &[size("sizeIn", 8), size("sizeOut", 4)];

const CONV_PARAMS: &[ParamSpec] = &[
    size("sizeIn", 3),
    size("sizeOut", 32),
    size("kernelSize", 3),
    ParamSpec {
        name: "padding",
        domain: ParamDomain::NonNegativeInt,
        default: ParamDefault::Int(1),
        editable: true,
    },
];

const POOL_PARAMS: &[ParamSpec] = &[
    ParamSpec {
        name: "channels",
        domain: ParamDomain::PositiveInt,
        default: ParamDefault::Int(32),
        editable: false,
    },
    size("kernelSize", 2),
    size("stride", 2),
    ParamSpec {
        name: "poolType",
        domain: ParamDomain::Choice(POOL_TYPES),
        default: ParamDefault::Text("max"),
        editable: true,
    },
];

const CLASSIFIER_PARAMS: &[ParamSpec] = &[ParamSpec {
    name: "classes",
    domain: ParamDomain::Names,
    default: ParamDefault::NoNames,
    editable: true,
}];

const TRAINING_PARAMS: &[ParamSpec] = &[
    size("epochs", 10),
    size("batchSize", 32),
    ParamSpec {
        name: "learningRate",
        domain: ParamDomain::PositiveFloat,
        default: ParamDefault::Float(0.001),
        editable: true,
    },
    ParamSpec {
        name: "optimizer",
        domain: ParamDomain::Choice(OPTIMIZERS),
        default: ParamDefault::Text("adam"),
        editable: true,
    },
    ParamSpec {
        name: "validationSplit",
        domain: ParamDomain::Fraction,
        default: ParamDefault::Float(0.2),
        editable: true,
    },
    ParamSpec {
        name: "shuffle",
        domain: ParamDomain::Flag,
        default: ParamDefault::Bool(true),
        editable: true,
    },
];

static REGISTRY: [BlockSpec; 8] = [
    BlockSpec {
        kind: BlockKind::Input,
        label: "Input Layer",
        family: Some(Family::Neural),
        is_layer: true,
        params: INPUT_PARAMS,
    },
    BlockSpec {
        kind: BlockKind::Hidden,
        label: "Hidden Layer",
        family: Some(Family::Neural),
        is_layer: true,
        params: HIDDEN_PARAMS,
    },
    BlockSpec {
        kind: BlockKind::Output,
        label: "Output Layer",
        family: Some(Family::Neural),
        is_layer: true,
        params: OUTPUT_PARAMS,
    },
    BlockSpec {
        kind: BlockKind::Convolutional,
        label: "Convolutional Layer",
        family: Some(Family::Spatial),
        is_layer: true,
        params: CONV_PARAMS,
    },
    BlockSpec {
        kind: BlockKind::Pooling,
        label: "Pooling Layer",
        family: Some(Family::Spatial),
        is_layer: true,
        params: POOL_PARAMS,
    },
    BlockSpec {
        kind: BlockKind::Classifier,
        label: "Classifier",
        family: None,
        is_layer: false,
        params: CLASSIFIER_PARAMS,
    },
    BlockSpec {
        kind: BlockKind::Training,
        label: "Training",
        family: None,
        is_layer: false,
        params: TRAINING_PARAMS,
    },
    BlockSpec {
        kind: BlockKind::Start,
        label: "Start",
        family: None,
        is_layer: false,
        params: &[],
    },
];

/// All registered block kinds, in palette order.
pub fn all_specs() -> &'static [BlockSpec] {
    &REGISTRY
}

/// Schema for a known kind.
pub fn spec(kind: BlockKind) -> &'static BlockSpec {
    match kind {
        BlockKind::Input => &REGISTRY[0],
        BlockKind::Hidden => &REGISTRY[1],
        BlockKind::Output => &REGISTRY[2],
        BlockKind::Convolutional => &REGISTRY[3],
        BlockKind::Pooling => &REGISTRY[4],
        BlockKind::Classifier => &REGISTRY[5],
        BlockKind::Training => &REGISTRY[6],
        BlockKind::Start => &REGISTRY[7],
    }
}

/// Looks up an editor type string. Never fails: unknown kinds yield the
/// [`RegistryEntry::Unrecognized`] sentinel.
pub fn lookup(kind: &str) -> RegistryEntry {
    match BlockKind::from_wire(kind) {
        Some(k) => RegistryEntry::Known(spec(k)),
        None => RegistryEntry::Unrecognized {
            kind: kind.to_string(),
        },
    }
}
