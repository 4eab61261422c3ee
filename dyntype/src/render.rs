use std::fmt::{Display, Write};

use crate::{
    errors::{Error, Result},
    heap::VirtualHeap,
    types::{Shape, TypeDescriptor},
    value::ValueCell,
};

impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.shape() {
            Shape::Basic(basic) => {
                let prefix = match (basic.is_floating(), basic.is_signed()) {
                    (true, _) => 'f',
                    (false, true) => 'i',
                    (false, false) => 'u',
                };

                write!(f, "{prefix}{}", basic.width().saturating_mul(8))?;
            }
            Shape::Struct(r#struct) => {
                write!(f, "struct {{")?;

                for (index, field) in r#struct.fields().iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }

                    write!(f, "{field}")?;
                }

                write!(f, "}}")?;
            }
        }

        for _ in 0..self.indirection_depth() {
            write!(f, "*")?;
        }

        Ok(())
    }
}

/// Renders a cell as text, e.g. `struct {i32(1), u8*(0x00005581c7a4f2b0)}`.
///
/// Pointers are shown as the absolute address they resolve to within `heap`.
///
/// # Errors
/// Returns `SizeMismatch` for cells whose bytes disagree with their type, and `TypeMismatch` for
/// floats that are neither 32 nor 64 bits wide.
pub fn render_value(cell: &ValueCell, heap: &VirtualHeap) -> Result<String> {
    let mut output = String::new();
    write_value(&mut output, cell, heap)?;

    Ok(output)
}

fn write_value(output: &mut String, cell: &ValueCell, heap: &VirtualHeap) -> Result<()> {
    let r#type = cell.r#type();

    if r#type.is_pointer() {
        let address = cell.as_native::<usize>(heap)?;
        let _ = write!(output, "{}(0x{address:016x})", r#type);

        return Ok(());
    }

    match r#type.shape() {
        Shape::Basic(basic) => {
            let _ = write!(output, "{}(", r#type);

            match (basic.is_floating(), basic.is_signed(), basic.width()) {
                (true, _, 4) => write_native(output, cell.as_native::<f32>(heap)?),
                (true, _, 8) => write_native(output, cell.as_native::<f64>(heap)?),
                (true, _, _) => {
                    return Err(Error::TypeMismatch {
                        actual: r#type.clone(),
                        reason: "only 32 and 64 bit floats can be rendered",
                    });
                }
                (false, true, 1) => write_native(output, cell.as_native::<i8>(heap)?),
                (false, true, 2) => write_native(output, cell.as_native::<i16>(heap)?),
                (false, true, 4) => write_native(output, cell.as_native::<i32>(heap)?),
                (false, true, 8) => write_native(output, cell.as_native::<i64>(heap)?),
                (false, false, 1) => write_native(output, cell.as_native::<u8>(heap)?),
                (false, false, 2) => write_native(output, cell.as_native::<u16>(heap)?),
                (false, false, 4) => write_native(output, cell.as_native::<u32>(heap)?),
                (false, false, 8) => write_native(output, cell.as_native::<u64>(heap)?),
                (false, _, _) => write_hex(output, cell)?,
            }

            output.push(')');
        }
        Shape::Struct(r#struct) => {
            output.push_str("struct {");

            for index in 0..r#struct.field_count() {
                if index > 0 {
                    output.push_str(", ");
                }

                write_value(output, &cell.field(index)?, heap)?;
            }

            output.push('}');
        }
    }

    Ok(())
}

fn write_native(output: &mut String, value: impl Display) {
    let _ = write!(output, "{value}");
}

// Integers of unusual widths are printed as their raw bytes, most significant first.
fn write_hex(output: &mut String, cell: &ValueCell) -> Result<()> {
    if cell.bytes().len() as u64 != cell.r#type().size_of() {
        return Err(Error::SizeMismatch {
            r#type: cell.r#type().clone(),
            expected: cell.r#type().size_of(),
            actual: cell.bytes().len() as u64,
        });
    }

    output.push_str("0x");
    for byte in cell.bytes().iter().rev() {
        let _ = write!(output, "{byte:02x}");
    }

    Ok(())
}
