use thiserror::Error;

/// User-input errors raised while sanitizing an AST.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("undeclared identifier `{name}`")]
    UndeclaredIdentifier { name: String },
    #[error("`{name}` is already declared in this scope")]
    DuplicateDeclaration { name: String },
    #[error("`{name}` is a {found}, expected a {expected}")]
    UnexpectedSymbol {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("type mismatch in {node}: expected {expected}, found {found}")]
    TypeMismatch {
        node: &'static str,
        expected: String,
        found: String,
    },
    #[error("arity mismatch in {node}: expected {expected}, found {found}")]
    ArityMismatch {
        node: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("swizzle component {component} is out of range for a {count}-component vector")]
    SwizzleOutOfRange { component: usize, count: u32 },
    #[error("swizzle selects {0} components, expected 1 to 4")]
    InvalidSwizzleCount(usize),
    #[error("struct `{struct_name}` has no member #{index}")]
    MemberIndexOutOfRange { struct_name: String, index: usize },
    #[error("struct `{struct_name}` has no member named `{member}`")]
    UnknownMember { struct_name: String, member: String },
    #[error("{node} cannot be assigned to")]
    NotAssignable { node: &'static str },
    #[error("{node} is not allowed here: {reason}")]
    Misplaced {
        node: &'static str,
        reason: &'static str,
    },
    #[error("multiple entry points for the {0} stage")]
    DuplicateEntryPoint(&'static str),
    #[error("struct `{struct_name}` is used in a uniform block and must be declared with [layout(std140)]")]
    MissingLayout { struct_name: String },
    #[error("invalid entry point `{name}`: {reason}")]
    InvalidEntryPoint { name: String, reason: &'static str },
}

/// Broken invariants between pipeline stages. Never caused by user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("{kind} index {index} is not registered")]
    UnregisteredIndex { kind: &'static str, index: usize },
    #[error("{kind} index {index} is registered twice")]
    DuplicateIndex { kind: &'static str, index: usize },
    #[error("identifier type `{0}` reached code generation unresolved")]
    UnresolvedIdentifierType(String),
    #[error("{0} reached code generation unsanitized")]
    UnsanitizedNode(&'static str),
    #[error("{0} is not addressable")]
    NotAddressable(&'static str),
    #[error("block %{label} ends with {count} terminators, expected exactly one")]
    TerminatorCount { label: u32, count: usize },
    #[error("block %{label} has instructions after its terminator")]
    MisplacedTerminator { label: u32 },
    #[error("{0} emitted outside of a function body")]
    NoActiveFunction(&'static str),
    #[error("scope closed without a matching open")]
    UnbalancedScope,
    #[error("writer state accessed outside of generate")]
    NoActiveState,
    #[error("cannot lower {0}")]
    Unsupported(String),
}
