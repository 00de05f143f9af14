//! The external converter seam: SVG bytes in, PNG bytes out.
//!
//! The stage never rasterizes anything itself. It hands the buffer and the
//! configured [`ConversionOptions`] to a [`Rasterizer`] and awaits the result;
//! that call is the only point where a conversion suspends.
//!
//! Two implementations ship with the crate:
//!
//! * [`FnRasterizer`]: wraps an async closure. Handy for embedding an
//!   in-process codec and for test doubles.
//! * [`CommandRasterizer`]: pipes the SVG through an external program such as
//!   `rsvg-convert` (stdin → stdout).

use crate::config::ConversionOptions;
use crate::error::RasterizeError;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Converts one SVG document into PNG bytes.
///
/// Implementations must be `Send + Sync`: with bounded concurrency several
/// conversions share one rasterizer from different tasks.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(
        &self,
        svg: Vec<u8>,
        options: &ConversionOptions,
    ) -> Result<Vec<u8>, RasterizeError>;
}

/// A [`Rasterizer`] backed by an async closure.
pub struct FnRasterizer<F> {
    f: F,
}

/// Build a [`Rasterizer`] from an async closure.
///
/// ```rust
/// use edgequake_svg2png::pipeline::rasterize::from_fn;
/// use edgequake_svg2png::RasterizeError;
///
/// let png_magic = from_fn(|_svg, _opts| async {
///     Ok::<_, RasterizeError>(vec![0x89, 0x50, 0x4e, 0x47])
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnRasterizer<F>
where
    F: Fn(Vec<u8>, ConversionOptions) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>, RasterizeError>> + Send,
{
    FnRasterizer { f }
}

#[async_trait]
impl<F, Fut> Rasterizer for FnRasterizer<F>
where
    F: Fn(Vec<u8>, ConversionOptions) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>, RasterizeError>> + Send,
{
    async fn rasterize(
        &self,
        svg: Vec<u8>,
        options: &ConversionOptions,
    ) -> Result<Vec<u8>, RasterizeError> {
        (self.f)(svg, options.clone()).await
    }
}

/// Runs an external program that reads SVG on stdin and writes PNG on stdout.
///
/// Conversion options become command-line flags appended after the fixed
/// arguments: `{"width": 64}` → `--width=64`, `{"keep-aspect-ratio": true}` →
/// `--keep-aspect-ratio`. `false` and `null` values are omitted, arrays repeat
/// the flag once per element.
#[derive(Debug, Clone)]
pub struct CommandRasterizer {
    program: String,
    args: Vec<String>,
}

impl CommandRasterizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// `rsvg-convert --format=png`, reading stdin and writing stdout.
    pub fn rsvg_convert() -> Self {
        Self::new("rsvg-convert").arg("--format=png")
    }

    /// Append a fixed argument, placed before the option flags.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn spawn_error(&self, source: std::io::Error) -> RasterizeError {
        RasterizeError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

#[async_trait]
impl Rasterizer for CommandRasterizer {
    async fn rasterize(
        &self,
        svg: Vec<u8>,
        options: &ConversionOptions,
    ) -> Result<Vec<u8>, RasterizeError> {
        let flags = option_flags(options);
        debug!("Running {} {:?} {:?}", self.program, self.args, flags);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(&flags)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RasterizeError::failed("child stdin was not captured"))?;

        // Feed stdin from its own task so a large SVG cannot deadlock against
        // a full stdout pipe.
        let writer = tokio::spawn(async move {
            stdin.write_all(&svg).await?;
            stdin.shutdown().await
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        let written = writer
            .await
            .map_err(|e| RasterizeError::failed(format!("stdin writer task failed: {e}")))?;

        if !output.status.success() {
            return Err(RasterizeError::Exit {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written.map_err(|e| self.spawn_error(e))?;

        if output.stdout.is_empty() {
            return Err(RasterizeError::failed(format!(
                "'{}' produced no output",
                self.program
            )));
        }
        Ok(output.stdout)
    }
}

/// Render conversion options as `--key[=value]` flags, in key order.
pub fn option_flags(options: &ConversionOptions) -> Vec<String> {
    let mut flags = Vec::new();
    for (key, value) in options {
        push_flag(&mut flags, key, value);
    }
    flags
}

fn push_flag(flags: &mut Vec<String>, key: &str, value: &Value) {
    match value {
        Value::Null | Value::Bool(false) => {}
        Value::Bool(true) => flags.push(format!("--{key}")),
        Value::String(s) => flags.push(format!("--{key}={s}")),
        Value::Number(n) => flags.push(format!("--{key}={n}")),
        Value::Array(items) => {
            for item in items {
                push_flag(flags, key, item);
            }
        }
        Value::Object(_) => flags.push(format!("--{key}={value}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts(v: Value) -> ConversionOptions {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn flags_from_options() {
        let o = opts(json!({
            "width": 64,
            "background-color": "white",
            "keep-aspect-ratio": true,
            "unlimited": false,
            "dpi-x": null,
        }));
        assert_eq!(
            option_flags(&o),
            vec![
                "--background-color=white".to_string(),
                "--keep-aspect-ratio".to_string(),
                "--width=64".to_string(),
            ]
        );
    }

    #[test]
    fn array_repeats_flag() {
        let o = opts(json!({ "stylesheet": ["a.css", "b.css"] }));
        assert_eq!(
            option_flags(&o),
            vec!["--stylesheet=a.css".to_string(), "--stylesheet=b.css".to_string()]
        );
    }

    #[tokio::test]
    async fn fn_rasterizer_receives_options() {
        let r = from_fn(|svg: Vec<u8>, opts: ConversionOptions| async move {
            let width = opts.get("width").and_then(Value::as_u64).unwrap_or(0);
            Ok::<_, RasterizeError>(vec![svg.len() as u8, width as u8])
        });
        let out = r
            .rasterize(b"<svg/>".to_vec(), &opts(json!({ "width": 7 })))
            .await
            .unwrap();
        assert_eq!(out, vec![6, 7]);
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let r = CommandRasterizer::new("definitely-not-a-real-rasterizer-binary");
        let err = r
            .rasterize(b"<svg/>".to_vec(), &ConversionOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RasterizeError::Spawn { .. }), "got: {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_pipes_stdin_to_stdout() {
        let r = CommandRasterizer::new("cat");
        let out = r
            .rasterize(b"<svg></svg>".to_vec(), &ConversionOptions::new())
            .await
            .unwrap();
        assert_eq!(out, b"<svg></svg>".to_vec());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_failure_reports_exit() {
        let r = CommandRasterizer::new("sh").arg("-c").arg("echo nope >&2; exit 3");
        let err = r
            .rasterize(b"<svg/>".to_vec(), &ConversionOptions::new())
            .await
            .unwrap_err();
        match err {
            RasterizeError::Exit { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "nope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
