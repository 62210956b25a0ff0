//! Transformation recipes and their ffmpeg argument rendering.
//!
//! A [`Recipe`] is the engine-neutral description of one transformation:
//! which inputs to read, what shape of processing to apply, and which extra
//! output options to pass along. [`Recipe::ffmpeg_args`] turns it into an
//! argument vector without touching the filesystem, so the mapping can be
//! tested without ffmpeg installed.

use std::fmt;
use std::path::{Path, PathBuf};

use mf_core::{Error, JobOptions, Resolution, Result};
use serde_json::Value;

/// A single engine output option, rendered as `-flag [value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOption {
    pub flag: String,
    pub value: Option<String>,
}

impl OutputOption {
    pub fn new(flag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            value: Some(value.into()),
        }
    }

    /// Convert a JSON options object into engine output options.
    ///
    /// Strings and numbers become `-flag value`, `null` becomes a bare
    /// `-flag`, booleans become `1`/`0`. Arrays, nested objects and flag
    /// names with characters outside `[A-Za-z0-9_:.-]` are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transform`] naming the offending key.
    pub fn from_map(map: &JobOptions) -> Result<Vec<Self>> {
        map.iter()
            .map(|(key, value)| {
                let flag = key.trim().trim_start_matches('-');
                let valid = !flag.is_empty()
                    && flag
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.' | '-'));
                if !valid {
                    return Err(Error::transform(format!("invalid engine option name '{key}'")));
                }

                let value = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
                    Value::Array(_) | Value::Object(_) => {
                        return Err(Error::transform(format!(
                            "engine option '{key}' must be a string, number, boolean or null"
                        )))
                    }
                };

                Ok(Self {
                    flag: flag.to_string(),
                    value,
                })
            })
            .collect()
    }
}

impl fmt::Display for OutputOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "-{} {}", self.flag, v),
            None => write!(f, "-{}", self.flag),
        }
    }
}

/// One transformation, selected by job type.
#[derive(Debug, Clone, PartialEq)]
pub enum Recipe {
    /// Concatenate video and audio of all inputs in order.
    Concat {
        inputs: Vec<PathBuf>,
        options: Vec<OutputOption>,
    },
    /// Scale a single input to a fixed frame size.
    Scale {
        input: PathBuf,
        resolution: Resolution,
        options: Vec<OutputOption>,
    },
    /// Re-encode a single input.
    Encode {
        input: PathBuf,
        options: Vec<OutputOption>,
    },
}

impl Recipe {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Recipe::Concat { .. } => "concat",
            Recipe::Scale { .. } => "scale",
            Recipe::Encode { .. } => "encode",
        }
    }

    /// Input files read by this recipe, in order.
    pub fn inputs(&self) -> Vec<&Path> {
        match self {
            Recipe::Concat { inputs, .. } => inputs.iter().map(PathBuf::as_path).collect(),
            Recipe::Scale { input, .. } | Recipe::Encode { input, .. } => vec![input.as_path()],
        }
    }

    pub fn options(&self) -> &[OutputOption] {
        match self {
            Recipe::Concat { options, .. }
            | Recipe::Scale { options, .. }
            | Recipe::Encode { options, .. } => options,
        }
    }

    /// Render the full ffmpeg argument list writing to `output`.
    ///
    /// The output container is inferred by ffmpeg from the extension of
    /// `output`; existing files are overwritten.
    pub fn ffmpeg_args(&self, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-nostdin".into(), "-y".into()];

        for input in self.inputs() {
            args.push("-i".into());
            args.push(input.to_string_lossy().to_string());
        }

        match self {
            Recipe::Concat { inputs, .. } => {
                let pads: String = (0..inputs.len()).map(|i| format!("[{i}:v][{i}:a]")).collect();
                args.push("-filter_complex".into());
                args.push(format!(
                    "{pads}concat=n={}:v=1:a=1[outv][outa]",
                    inputs.len()
                ));
                args.extend(["-map".into(), "[outv]".into(), "-map".into(), "[outa]".into()]);
            }
            Recipe::Scale { resolution, .. } => {
                args.push("-s".into());
                args.push(resolution.to_string());
            }
            Recipe::Encode { .. } => {}
        }

        for opt in self.options() {
            args.push(format!("-{}", opt.flag));
            if let Some(v) = &opt.value {
                args.push(v.clone());
            }
        }

        args.push(output.to_string_lossy().to_string());
        args
    }
}
