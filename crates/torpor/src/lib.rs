#![doc = include_str!("../../../README.md")]

mod args;
mod asyncio;
mod builtins;
mod bytecode;
mod exception_private;
mod exception_public;
mod heap;
mod intern;
mod io;
mod object;
mod os;
mod program;
mod py_hash;
mod resource;
mod run;
mod types;
mod value;

pub use crate::{
    bytecode::{BinaryOpKind, CodeBuilder, CompareOpKind, Code, JumpLabel, Opcode},
    exception_private::ExcType,
    exception_public::Exception,
    heap::HeapId,
    intern::{BytesId, ExtFunctionId, FunctionId, RecordTypeId, StringId},
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    object::{DictPairs, InvalidInputError, Object},
    os::{dir_stat, file_stat, stat_result, OsFunction, StatResult},
    program::{ConstValue, Program, ProgramBuilder},
    resource::{
        DEFAULT_MAX_RECURSION_DEPTH, LimitedTracker, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker,
    },
    run::{ExternalHandler, ExternalResult, OsHandler, RunProgress, Runner, Snapshot},
    types::Type,
};
