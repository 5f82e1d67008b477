/// The subset of a JVM method descriptor (`"(...)R"`) the core needs: just
/// whether the method returns `int` or `void`. Full parameter/return-type
/// parsing (arrays, references, floating point) is out of scope: spec.md
/// §3 only requires distinguishing `I`-returning methods from `V`-returning
/// ones, since that is what selects the trampoline's `ireturn` vs. `return`
/// epilogue behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Int,
    Void,
    /// Any other return type (`long`, object reference, array, …). Methods
    /// with this return kind can still be decoded and analyzed, but the
    /// code generator has nothing well-defined to put in the integer
    /// return register, so compiling one natively is refused upstream by
    /// the pipeline.
    Other,
}

/// Parse the return-type tail of a method descriptor such as `"(II)I"`.
#[must_use]
pub fn return_kind(descriptor: &str) -> ReturnKind {
    match descriptor.rsplit(')').next() {
        Some("I") => ReturnKind::Int,
        Some("V") => ReturnKind::Void,
        _ => ReturnKind::Other,
    }
}

#[test]
fn classifies_int_and_void_returns() {
    assert_eq!(return_kind("()I"), ReturnKind::Int);
    assert_eq!(return_kind("(II)I"), ReturnKind::Int);
    assert_eq!(return_kind("()V"), ReturnKind::Void);
    assert_eq!(return_kind("()Ljava/lang/Object;"), ReturnKind::Other);
    assert_eq!(return_kind("()J"), ReturnKind::Other);
}
