//! `hajimu` command-line interface

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use hajimu::error::UncaughtError;
use hajimu::value::StackFrame;
use hajimu::{bytecode, plugin, EvalContext, HajimuError, Interpreter, SourceMap, Value};

/// Exit code for command-line misuse.
const EXIT_USAGE: u8 = 3;

/// Hajimu: a programming language with Japanese keywords
#[derive(Parser, Debug)]
#[command(name = "hajimu", version, about, long_about = None)]
struct Cli {
    /// Program to run (`.jp` source or `.hjp` bytecode); omit for the REPL
    file: Option<PathBuf>,

    /// Evaluate one expression and print its value
    #[arg(short = 'e', long = "eval", value_name = "EXPR", conflicts_with_all = ["file", "compile"])]
    expr: Option<String>,

    /// Compile a source file to HJPB bytecode
    #[arg(short = 'c', long = "compile", value_name = "FILE", conflicts_with = "file")]
    compile: Option<PathBuf>,

    /// Output path for `-c` (defaults to the input with a `.hjp` extension)
    #[arg(short = 'o', long = "output", value_name = "FILE", requires = "compile")]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let usage = e.use_stderr();
            let _ = e.print();
            return if usage {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    setup_logging(cli.verbose);

    // Deeply recursive programs need more stack than the main thread has.
    let code = match hajimu::runtime::with_large_stack(move || run(cli)) {
        Ok(Ok(code)) => code,
        Ok(Err(e)) => {
            eprintln!("エラー: {:#}", e);
            1
        }
        Err(e) => {
            eprintln!("エラー: スレッドを起動できません: {}", e);
            1
        }
    };
    plugin::shutdown();
    ExitCode::from(code)
}

fn setup_logging(verbose: u8) {
    let filter = EnvFilter::try_from_env("HAJIMU_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "hajimu=debug",
            _ => "trace",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<u8> {
    if let Some(input) = &cli.compile {
        return compile(input, cli.output.as_deref());
    }

    let mut ctx = EvalContext::from_env();
    ctx.trace = cli.verbose >= 2;
    tracing::debug!(workers = ctx.worker_threads, home = %ctx.home.display(), "starting");
    let mut interp = Interpreter::with_context(ctx);

    if let Some(expr) = &cli.expr {
        return Ok(match interp.eval_expression(expr) {
            Ok(value) => {
                println!("{}", value);
                0
            }
            Err(e) => report(&e, Some(&SourceMap::new("<式>", expr.as_str()))),
        });
    }

    match &cli.file {
        Some(path) => Ok(run_file(&mut interp, path)),
        None => repl(&mut interp),
    }
}

fn run_file(interp: &mut Interpreter, path: &Path) -> u8 {
    match interp.run_file(path) {
        Ok(_) => 0,
        Err(e) => {
            // Lex and parse errors carry only a span; reread for the excerpt.
            let source = std::fs::read_to_string(path)
                .ok()
                .map(|src| SourceMap::new(path.display().to_string(), src));
            report(&e, source.as_ref())
        }
    }
}

fn compile(input: &Path, output: Option<&Path>) -> Result<u8> {
    let src = std::fs::read_to_string(input)
        .with_context(|| format!("{} を読み込めません", input.display()))?;
    let bytes = match bytecode::compile(&src) {
        Ok(bytes) => bytes,
        Err(e) => {
            let source = SourceMap::new(input.display().to_string(), src.as_str());
            let e = match e {
                hajimu::error::ParseError::Lex(e) => HajimuError::Lex(e),
                e => HajimuError::Parse(e),
            };
            return Ok(report(&e, Some(&source)));
        }
    };
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("hjp"));
    std::fs::write(&output, &bytes)
        .with_context(|| format!("{} に書き込めません", output.display()))?;
    tracing::info!(output = %output.display(), bytes = bytes.len(), "compiled");
    Ok(0)
}

// ═══════════════════════════════════════════════════════════════════════
// REPL
// ═══════════════════════════════════════════════════════════════════════

fn repl(interp: &mut Interpreter) -> Result<u8> {
    println!("はじむ {} (終了は Ctrl-D)", hajimu::VERSION);
    let mut editor = DefaultEditor::new().context("端末を初期化できません")?;
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "はじむ> " } else { "...... " };
        let line = match editor.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("入力を読み込めません"),
        };
        buffer.push_str(&line);
        buffer.push('\n');
        if is_incomplete(&buffer) {
            continue;
        }

        let _ = editor.add_history_entry(buffer.trim_end());
        let src = std::mem::take(&mut buffer);
        match interp.run_source("<repl>", &src) {
            Ok(Value::Null) => {}
            Ok(value) => println!("{}", value),
            Err(e) => {
                report(&e, Some(&SourceMap::new("<repl>", src.as_str())));
            }
        }
    }
    Ok(0)
}

/// Whether `src` fails to parse only because it stops early, e.g. inside
/// an unfinished `関数 … 終わり`.
fn is_incomplete(src: &str) -> bool {
    match hajimu::parser::parse(src) {
        Ok(_) => false,
        Err(e) => e.span().start as usize >= src.trim_end().len(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Error Reporting
// ═══════════════════════════════════════════════════════════════════════

/// Print `error` to stderr and return the exit code for it.
fn report(error: &HajimuError, source: Option<&SourceMap>) -> u8 {
    match error {
        HajimuError::Runtime(UncaughtError(e)) => {
            let headline = format!("{}: {}", e.kind, e.message);
            match (e.origin.as_deref().or(source), e.span) {
                (Some(map), Some(span)) if !map.source().is_empty() => {
                    eprintln!("{}", map.render(span, &headline))
                }
                _ => eprintln!("{}", headline),
            }
            for line in frame_lines(&e.stack) {
                eprintln!("    {}", line);
            }
            let mut cause = e.cause.clone();
            while let Some(next) = cause {
                eprintln!("原因: {}", next);
                cause = match next {
                    Value::Error(inner) => inner.cause.clone(),
                    _ => None,
                };
            }
        }
        other => match (source, other.span()) {
            (Some(map), Some(span)) => eprintln!("{}", map.render(span, &other.to_string())),
            _ => eprintln!("{}", other),
        },
    }
    error.exit_code() as u8
}

/// One line per run of identical frames; a repeated frame gets a count.
fn frame_lines(stack: &[StackFrame]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut i = 0;
    while i < stack.len() {
        let frame = &stack[i];
        let run = stack[i..]
            .iter()
            .take_while(|f| f.function == frame.function && f.at == frame.at)
            .count();
        let mut line = match frame.at {
            Some(at) => format!("{} ({})", frame.function, at),
            None => frame.function.clone(),
        };
        if run > 1 {
            line.push_str(&format!(" ×{}", run));
        }
        lines.push(line);
        i += run;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use hajimu::LineCol;
    use pretty_assertions::assert_eq;

    fn frame(function: &str, line: u32) -> StackFrame {
        StackFrame {
            function: function.to_string(),
            span: None,
            at: Some(LineCol { line, col: 9 }),
        }
    }

    #[test]
    fn test_repeated_frames_collapse() {
        let mut stack = vec![frame("f", 5); 63];
        stack.push(frame("f", 8));
        stack.push(StackFrame {
            function: "<メイン>".to_string(),
            span: None,
            at: None,
        });
        assert_eq!(
            frame_lines(&stack),
            vec!["f (5:9) ×63", "f (8:9)", "<メイン>"]
        );
    }

    #[test]
    fn test_distinct_frames_are_listed_in_order() {
        let stack = vec![frame("g", 2), frame("f", 5), frame("g", 2)];
        assert_eq!(frame_lines(&stack), vec!["g (2:9)", "f (5:9)", "g (2:9)"]);
    }
}
