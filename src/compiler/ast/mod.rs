//! Shader Abstract Syntax Tree
//!
//! Inert node model shared by every compiler stage. Expressions own their
//! children exclusively; types and symbol indices stay empty until the
//! sanitizer fills them in.
pub mod builder;
mod expr;
mod stmt;
mod ty;
mod visit;

pub use expr::*;
pub use stmt::*;
pub use ty::*;
pub use visit::{ExpressionVisitor, StatementVisitor};

#[macro_export]
macro_rules! def_into_expr {
    ($($name:ident => $desc:literal,)+) => {
        $(
            paste::paste! {
                impl [<Expr $name>] {
                    pub fn into_expr(self) -> Expr {
                        Expr::new(ExprKind::$name(self))
                    }
                }
                impl Expr {
                    #[allow(dead_code)]
                    pub fn [<as_ $name:snake>](&self) -> Option<&[<Expr $name>]> {
                        match &self.kind {
                            ExprKind::$name(x) => Some(x),
                            _ => None,
                        }
                    }
                }
            }
        )+
        impl ExprKind {
            pub fn describe(&self) -> &'static str {
                match self {
                    $(
                        ExprKind::$name(_) => $desc,
                    )+
                }
            }
        }
    };
}

#[macro_export]
macro_rules! def_into_stmt {
    ($($name:ident => $desc:literal,)+) => {
        $(
            paste::paste! {
                impl [<Stmt $name>] {
                    pub fn into_stmt(self) -> Stmt {
                        Stmt::$name(self)
                    }
                }
                impl Stmt {
                    #[allow(dead_code)]
                    pub fn [<as_ $name:snake>](&self) -> Option<&[<Stmt $name>]> {
                        match self {
                            Stmt::$name(x) => Some(x),
                            _ => None,
                        }
                    }
                }
            }
        )+
        impl Stmt {
            pub fn describe(&self) -> &'static str {
                match self {
                    $(
                        Stmt::$name(_) => $desc,
                    )+
                }
            }
        }
    };
}
