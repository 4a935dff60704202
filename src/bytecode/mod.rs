//! Instruction-list abstraction over host method bodies.
//!
//! Everything fragile about load-time rewriting is concentrated here, behind
//! a narrow seam with its own correctness suite: decoding bodies into
//! instruction lists, editing them in index form, encoding them back, and
//! verifying that what comes out is still structurally valid by the host
//! loader's rules. The transform engine never touches raw code bytes.
//!
//! # Key Types
//! - [`Instruction`] / [`Op`] - A decoded operation and its operands
//! - [`CodeEditor`] - Index-form editing with branch/exception remapping
//! - [`Verifier`] - Operand stack and local typing verification
//! - [`AncestorResolver`] - The reference-merge seam, with its conservative
//!   [`UniversalBase`] fallback and the [`RegistryResolver`] default
//!
//! # Main Functions
//! - [`decode_instruction`] / [`decode_stream`] - Bytes to instructions
//! - [`encode_op`] / [`encode_stream`] - Instructions to bytes
//! - [`verify_method`] - Full verification of a parsed method
//!
//! # Example
//! ```rust
//! use hostgraft::bytecode::{decode_stream, Op};
//! use hostgraft::class::ConstantPool;
//!
//! let pool = ConstantPool::new();
//! let code = [0x00, 0x40]; // nop, ret.void
//! let instructions = decode_stream(&code, &pool)?;
//! assert_eq!(instructions[1].op, Op::Ret(None));
//! # Ok::<(), hostgraft::Error>(())
//! ```

mod ancestry;
mod decoder;
mod editor;
mod encoder;
mod instruction;
mod verifier;

pub use ancestry::{AncestorResolver, ClassRegistry, RegistryResolver, UniversalBase};
pub use decoder::{decode_instruction, decode_stream};
pub use editor::{CodeEditor, EhRange};
pub use encoder::{encode_op, encode_stream};
pub use instruction::{FlowType, Instruction, Op, ValueKind};
pub use verifier::{verify_method, MethodContext, Verified, Verifier};
