//! 编译模块：将原始模板校验并编译为可执行结构
pub mod compiler;
pub mod pattern;

pub use self::compiler::TemplateCompiler;
pub use self::pattern::{
    CompiledExtractor, CompiledMatcher, CompiledTemplate, ExtractGroup, ExtractorKind,
    MatcherKind, OperatorBlock, Part, TemplateSet, WordList,
};
