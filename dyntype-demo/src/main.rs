use std::{
    ffi::{CStr, c_char},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use dyntype::{codec::PortableValue, native_struct, render::render_value};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Captures a native struct holding a C string, writes it to a file, reads it back and prints
/// the recovered fields.
#[derive(Parser, Debug)]
#[command(name = "dyntype-demo")]
struct Args {
    /// Where the encoded envelope is written
    #[arg(short, long, default_value = "test_struct.bin")]
    output: PathBuf,

    /// Keep the file around after reading it back
    #[arg(short, long)]
    keep: bool,
}

#[derive(Debug, Error)]
enum DemoError {
    #[error("I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Value(#[from] dyntype::Error),
}

#[native_struct]
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct SomeStuff {
    text: *const c_char,
    a: i32,
}

#[native_struct]
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct TestStruct {
    a: i32,
    b: f32,
    stuff: SomeStuff,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> Result<(), DemoError> {
    let io_error = |source| DemoError::Io {
        path: args.output.clone(),
        source,
    };

    let original = TestStruct {
        a: 1,
        b: 2.4,
        stuff: SomeStuff {
            text: c"hello".as_ptr(),
            a: 5,
        },
    };

    // SAFETY: `TestStruct` is packed and `text` points at a NUL-terminated literal
    let captured = unsafe { PortableValue::capture(&original)? };
    let encoded = captured.encode();

    info!(path = %args.output.display(), bytes = encoded.len(), "writing envelope");
    std::fs::write(&args.output, &encoded).map_err(io_error)?;

    let read_back = std::fs::read(&args.output).map_err(io_error)?;
    let decoded = PortableValue::decode(&read_back)?;

    // SAFETY: Every bit pattern is a valid `TestStruct`, and `decoded` outlives all uses of the
    // pointer inside it
    let restored = unsafe { decoded.value().reinterpret::<TestStruct>(decoded.heap())? };

    let a = restored.a;
    let b = restored.b;
    let stuff = restored.stuff;
    let text = stuff.text;
    let inner_a = stuff.a;

    // SAFETY: `text` points into the decoded heap, which holds the NUL-terminated copy captured
    // above
    let text = unsafe { CStr::from_ptr(text) };

    println!("a = {a}");
    println!("b = {b}");
    println!("stuff.text = {}", text.to_string_lossy());
    println!("stuff.a = {inner_a}");
    println!("{}", render_value(decoded.value(), decoded.heap())?);

    if !args.keep {
        std::fs::remove_file(&args.output).map_err(io_error)?;
    }

    Ok(())
}

fn main() -> ExitCode {
    init_logging();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "demo failed");
            ExitCode::FAILURE
        }
    }
}
