//! Textual form of a function, for tracing output and test expectations.
//!
//! ```text
//! func f0 Name(10) ($Int1) -> $Int64 {
//! bb0(%a0 : $Int1 @none):
//!   cond_br %a0, bb1(), bb2()
//! bb1:
//!   %i1 = integer_literal 1 : $Int64 @none
//!   br bb3(%i1)
//! ...
//! }
//! ```

use std::fmt::{self, Write};

use crate::{BlockId, Function, InstId, InstKind, LoadQualifier, StoreQualifier, Value};

impl Function {
    /// Render the function as text.
    pub fn dump(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sig = self.signature();
        write!(f, "func {:?} {:?} (", self.id(), self.name())?;
        write_list(f, sig.params.iter())?;
        write!(f, ") -> {}", sig.result)?;
        if let Some(error) = sig.error {
            write!(f, " throws {error}")?;
        }
        if !self.is_definition() {
            return f.write_char('\n');
        }
        f.write_str(" {\n")?;
        for &block in self.blocks() {
            self.fmt_block(f, block)?;
        }
        f.write_str("}\n")
    }
}

impl Function {
    fn fmt_block(&self, f: &mut fmt::Formatter<'_>, block: BlockId) -> fmt::Result {
        write!(f, "{block}")?;
        let args = self.block_args(block);
        if !args.is_empty() {
            f.write_char('(')?;
            for (i, &arg) in args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                let a = self.arg(arg);
                write!(f, "{} : {} {}", Value::Arg(arg), a.ty(), a.ownership())?;
            }
            f.write_char(')')?;
        }
        f.write_str(":\n")?;
        for inst in self.block_insts(block) {
            f.write_str("  ")?;
            self.fmt_inst(f, inst)?;
            f.write_char('\n')?;
        }
        Ok(())
    }

    fn fmt_inst(&self, f: &mut fmt::Formatter<'_>, inst: InstId) -> fmt::Result {
        let node = self.inst(inst);
        let results = self.results(inst);
        match results.as_slice() {
            [] => {}
            [single] => write!(f, "{single} = ")?,
            many => {
                f.write_char('(')?;
                write_list(f, many.iter())?;
                f.write_str(") = ")?;
            }
        }
        f.write_str(node.kind().mnemonic())?;

        let ops = node.operands();
        match node.kind() {
            InstKind::Branch { dest } => {
                write!(f, " {dest}(")?;
                write_list(f, ops.iter())?;
                f.write_char(')')?;
            }
            InstKind::CondBranch {
                true_dest,
                false_dest,
                ..
            } => {
                let t = node.successor_operands(*true_dest).unwrap_or_default();
                let e = if true_dest == false_dest {
                    &[][..]
                } else {
                    node.successor_operands(*false_dest).unwrap_or_default()
                };
                write!(f, " {}, {true_dest}(", ops[0])?;
                write_list(f, t.iter())?;
                write!(f, "), {false_dest}(")?;
                write_list(f, e.iter())?;
                f.write_char(')')?;
            }
            InstKind::Switch { cases, default } => {
                write!(f, " {}", ops[0])?;
                for (value, dest) in cases {
                    write!(f, ", case {value}: {dest}")?;
                }
                if let Some(default) = default {
                    write!(f, ", default: {default}")?;
                }
            }
            InstKind::TryApply { normal, error } => {
                write!(f, " {}(", ops[0])?;
                write_list(f, ops[1..].iter())?;
                write!(f, "), normal {normal}, error {error}")?;
            }
            kind => {
                fmt_immediates(f, kind)?;
                if !ops.is_empty() {
                    f.write_char(' ')?;
                    write_list(f, ops.iter())?;
                }
            }
        }

        if let [data, ..] = node.results() {
            if node.results().len() == 1 {
                write!(f, " : {} {}", data.ty(), data.ownership())?;
            } else {
                f.write_str(" : (")?;
                write_list(f, node.results().iter().map(|r| r.ty()))?;
                write!(f, ") {}", data.ownership())?;
            }
        }
        Ok(())
    }
}

fn fmt_immediates(f: &mut fmt::Formatter<'_>, kind: &InstKind) -> fmt::Result {
    match kind {
        InstKind::IntegerLiteral { value } => write!(f, " {value}"),
        InstKind::FunctionRef { func } => write!(f, " @{}", func.raw()),
        InstKind::StructExtract { field } => write!(f, " #{field}"),
        InstKind::TupleExtract { index } => write!(f, " #{index}"),
        InstKind::Load { qualifier } => f.write_str(match qualifier {
            LoadQualifier::Trivial => " [trivial]",
            LoadQualifier::Copy => " [copy]",
            LoadQualifier::Take => " [take]",
        }),
        InstKind::Store { qualifier } => f.write_str(match qualifier {
            StoreQualifier::Trivial => " [trivial]",
            StoreQualifier::Init => " [init]",
            StoreQualifier::Assign => " [assign]",
        }),
        InstKind::ClassMethod { method } => write!(f, " #{}", method.raw()),
        InstKind::WitnessMethod {
            protocol,
            method,
            lookup_type,
        } => write!(f, " {lookup_type}, #{}.{}", protocol.raw(), method.raw()),
        InstKind::InitExistential { concrete } => write!(f, " {concrete}"),
        _ => Ok(()),
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = T>) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::test_helpers::{class_types, diamond};

    #[test]
    fn dump_diamond() {
        let (types, _) = class_types();
        let d = diamond(&types);
        let expected = "\
func f0 Name(10) ($Int1) -> $Int64 {
bb0(%a0 : $Int1 @none):
  cond_br %a0, bb1(), bb2()
bb1:
  %i1 = integer_literal 1 : $Int64 @none
  br bb3(%i1)
bb2:
  %i3 = integer_literal 2 : $Int64 @none
  br bb3(%i3)
bb3(%a1 : $Int64 @none):
  return %a1
}
";
        assert_eq!(d.func.dump(), expected);
    }
}
