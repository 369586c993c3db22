//! Patch format understood by the reference engine
//!
//! One statement per line (or separated by `;`):
//! - `<wave> <freq> [gain]`  add a voice; wave is sine, saw, square or noise
//! - `dur <seconds>`         remove the unit automatically after this long
//!
//! `# ...` starts a comment. `$1`, `$2`, ... are replaced by the unit's
//! positional arguments before a statement is parsed.

use crate::error::{EngineError, EngineResult};
use crate::generator::Waveform;

/// Gain used when a voice line omits it
pub const DEFAULT_GAIN: f32 = 0.5;

/// One oscillator voice
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSpec {
    pub waveform: Waveform,
    pub frequency: f32,
    pub gain: f32,
}

/// A compiled unit, ready for admission
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub name: String,
    pub voices: Vec<VoiceSpec>,
    /// Lifetime in seconds; `None` runs until removed
    pub duration: Option<f32>,
}

/// Replace `$N` tokens with positional arguments (1-based)
fn substitute<'a>(token: &'a str, args: &'a [String]) -> Result<&'a str, String> {
    let Some(index) = token.strip_prefix('$') else {
        return Ok(token);
    };

    let n = index
        .parse::<usize>()
        .map_err(|_| format!("invalid argument reference '{}'", token))?;
    if n == 0 {
        return Err("argument references start at $1".to_string());
    }
    args.get(n - 1)
        .map(String::as_str)
        .ok_or_else(|| format!("missing argument {}", token))
}

fn parse_number(token: &str, what: &str) -> Result<f32, String> {
    let value = token
        .parse::<f32>()
        .map_err(|_| format!("invalid {} '{}'", what, token))?;
    if !value.is_finite() {
        return Err(format!("invalid {} '{}'", what, token));
    }
    Ok(value)
}

/// Parse one statement into the patch being built
fn parse_statement(tokens: &[&str], patch: &mut Patch) -> Result<(), String> {
    match tokens {
        ["dur", seconds] => {
            let seconds = parse_number(seconds, "duration")?;
            if seconds <= 0.0 {
                return Err(format!("duration must be positive, got {}", seconds));
            }
            patch.duration = Some(seconds);
            Ok(())
        }
        ["dur", ..] => Err("expected: dur <seconds>".to_string()),
        [wave, rest @ ..] => {
            let waveform = wave.parse::<Waveform>()?;
            let (frequency, gain) = match rest {
                [freq] => (parse_number(freq, "frequency")?, DEFAULT_GAIN),
                [freq, gain] => (
                    parse_number(freq, "frequency")?,
                    parse_number(gain, "gain")?,
                ),
                _ => return Err(format!("expected: {} <freq> [gain]", wave)),
            };
            if frequency < 0.0 {
                return Err(format!("frequency must not be negative, got {}", frequency));
            }
            patch.voices.push(VoiceSpec {
                waveform,
                frequency,
                gain,
            });
            Ok(())
        }
        [] => Ok(()),
    }
}

/// Compile patch source under `name` with positional `args`
pub fn compile_patch(name: &str, source: &str, args: &[String]) -> EngineResult<Patch> {
    let mut patch = Patch {
        name: name.to_string(),
        voices: Vec::new(),
        duration: None,
    };

    for (index, line) in source.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default();
        let compile_error = |message: String| EngineError::Compile {
            name: name.to_string(),
            line: index + 1,
            message,
        };

        for statement in line.split(';') {
            let tokens = statement
                .split_whitespace()
                .map(|token| substitute(token, args))
                .collect::<Result<Vec<_>, _>>()
                .map_err(compile_error)?;

            parse_statement(&tokens, &mut patch).map_err(compile_error)?;
        }
    }

    Ok(patch)
}
