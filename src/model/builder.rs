//! Fluent construction of [`MethodBody`] values.
//!
//! The builder is how tests, benchmarks and embedders without an SSA front end describe
//! methods. Arguments are created from the method signature up front; locals, temporaries
//! and blocks are added on demand. [`MethodBuilder::build`] validates the identities the
//! rest of the pipeline relies on.

use std::collections::HashSet;

use crate::{
    model::{
        BasicBlock, MethodBody, MethodRef, Op, RuntimeType, Terminator, VarId, VarOrigin,
        Variable,
    },
    Error, Result,
};

/// Builder for [`MethodBody`].
///
/// # Examples
///
/// ```rust
/// use dotprobe::model::{
///     CompareOp, Literal, MethodBuilder, MethodRef, Op, PrimitiveKind, RuntimeType,
///     Terminator, TypeName,
/// };
///
/// let method = MethodRef::new_static(
///     TypeName::new("Sample.Checks"),
///     "IsZero",
///     vec![RuntimeType::INT32],
///     Some(RuntimeType::BOOLEAN),
/// );
/// let mut builder = MethodBuilder::new(method, &["x"]);
/// let x = builder.argument(0)?;
/// let zero = builder.temp("zero", RuntimeType::INT32)?;
/// let result = builder.temp("result", RuntimeType::BOOLEAN)?;
/// let entry = builder.block();
/// builder.push(entry, Op::Const { dest: zero, value: Literal::Int(PrimitiveKind::Int32, 0) })?;
/// builder.push(entry, Op::Compare { dest: result, op: CompareOp::Eq, left: x, right: zero })?;
/// builder.terminate(entry, Terminator::Return(Some(result)))?;
/// let body = builder.build()?;
/// assert_eq!(body.blocks.len(), 1);
/// # Ok::<(), dotprobe::Error>(())
/// ```
#[derive(Debug)]
pub struct MethodBuilder {
    method: MethodRef,
    variables: Vec<Variable>,
    blocks: Vec<(Vec<Op>, Option<Terminator>, Option<usize>)>,
    locals: u16,
}

impl MethodBuilder {
    /// Creates a builder and declares one argument per signature position.
    ///
    /// # Arguments
    ///
    /// * `method` - The method being described
    /// * `param_names` - Names of the declared parameters, excluding `this`. Missing names
    ///   default to `arg<n>`.
    #[must_use]
    pub fn new(method: MethodRef, param_names: &[&str]) -> Self {
        let mut builder = MethodBuilder {
            method,
            variables: Vec::new(),
            blocks: Vec::new(),
            locals: 0,
        };

        let mut position: u16 = 0;
        let receiver = builder
            .method
            .argument_types()
            .into_iter()
            .next()
            .filter(|_| builder.method.has_this);
        if let Some(ty) = receiver {
            builder.add_variable("this".to_string(), ty, VarOrigin::Argument(position));
            position += 1;
        }
        let params = builder.method.params.clone();
        for (i, ty) in params.into_iter().enumerate() {
            let name = param_names
                .get(i)
                .map_or_else(|| format!("arg{i}"), |name| (*name).to_string());
            builder.add_variable(name, ty, VarOrigin::Argument(position));
            position += 1;
        }
        builder
    }

    fn add_variable(&mut self, name: String, ty: RuntimeType, origin: VarOrigin) -> VarId {
        let id = VarId::new(self.variables.len() as u32);
        self.variables.push(Variable {
            id,
            name,
            ty,
            origin,
        });
        id
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if self.variables.iter().any(|var| var.name == name) {
            return Err(Error::InvalidIdentity(format!(
                "variable name '{name}' already declared in {}",
                self.method
            )));
        }
        Ok(())
    }

    /// Returns the argument variable at `position` (`0` is `this` for instance methods).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if there is no such argument.
    pub fn argument(&self, position: u16) -> Result<VarId> {
        self.variables
            .iter()
            .find(|var| var.origin == VarOrigin::Argument(position))
            .map(|var| var.id)
            .ok_or_else(|| {
                Error::InvalidIdentity(format!("argument {position} of {}", self.method))
            })
    }

    /// Declares a local variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if the name is already taken.
    pub fn local(&mut self, name: &str, ty: RuntimeType) -> Result<VarId> {
        self.check_name(name)?;
        let origin = VarOrigin::Local(self.locals);
        self.locals += 1;
        Ok(self.add_variable(name.to_string(), ty, origin))
    }

    /// Declares an evaluation-stack temporary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if the name is already taken.
    pub fn temp(&mut self, name: &str, ty: RuntimeType) -> Result<VarId> {
        self.check_name(name)?;
        Ok(self.add_variable(name.to_string(), ty, VarOrigin::Temp))
    }

    /// Appends a new, empty block and returns its index.
    pub fn block(&mut self) -> usize {
        self.blocks.push((Vec::new(), None, None));
        self.blocks.len() - 1
    }

    fn block_mut(
        &mut self,
        index: usize,
    ) -> Result<&mut (Vec<Op>, Option<Terminator>, Option<usize>)> {
        let method = &self.method;
        self.blocks
            .get_mut(index)
            .ok_or_else(|| Error::InvalidIdentity(format!("block {index} in {method}")))
    }

    /// Appends an operation to a block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if the block does not exist or is already terminated.
    pub fn push(&mut self, block: usize, op: Op) -> Result<&mut Self> {
        let entry = self.block_mut(block)?;
        if entry.1.is_some() {
            return Err(Error::InvalidIdentity(format!(
                "block {block} is already terminated"
            )));
        }
        entry.0.push(op);
        Ok(self)
    }

    /// Sets the terminator of a block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if the block does not exist or is already terminated.
    pub fn terminate(&mut self, block: usize, terminator: Terminator) -> Result<&mut Self> {
        let entry = self.block_mut(block)?;
        if entry.1.is_some() {
            return Err(Error::InvalidIdentity(format!(
                "block {block} is already terminated"
            )));
        }
        entry.1 = Some(terminator);
        Ok(self)
    }

    /// Protects `block` with the catch-all `handler` block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if `block` does not exist.
    pub fn handler(&mut self, block: usize, handler: usize) -> Result<&mut Self> {
        self.block_mut(block)?.2 = Some(handler);
        Ok(self)
    }

    /// Validates and produces the method body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if the body has no blocks, a block is not
    /// terminated, an operation or terminator references an undeclared variable or block,
    /// or a variable is defined more than once.
    pub fn build(self) -> Result<MethodBody> {
        if self.blocks.is_empty() {
            return Err(Error::InvalidIdentity(format!(
                "{} has no blocks",
                self.method
            )));
        }

        let var_count = self.variables.len();
        let block_count = self.blocks.len();
        let check_var = |var: VarId| -> Result<()> {
            if var.index() < var_count {
                Ok(())
            } else {
                Err(Error::InvalidIdentity(format!("undeclared variable {var}")))
            }
        };
        let check_block = |index: usize| -> Result<()> {
            if index < block_count {
                Ok(())
            } else {
                Err(Error::InvalidIdentity(format!("undeclared block {index}")))
            }
        };

        let mut defined: HashSet<VarId> = HashSet::new();
        let mut blocks = Vec::with_capacity(block_count);
        for (index, (ops, terminator, handler)) in self.blocks.into_iter().enumerate() {
            let Some(terminator) = terminator else {
                return Err(Error::InvalidIdentity(format!(
                    "block {index} of {} has no terminator",
                    self.method
                )));
            };
            for op in &ops {
                for var in op.uses() {
                    check_var(var)?;
                }
                if let Some(dest) = op.dest() {
                    check_var(dest)?;
                    if !defined.insert(dest) {
                        return Err(Error::InvalidIdentity(format!(
                            "variable {dest} is defined twice"
                        )));
                    }
                }
                if let Op::Phi { operands, .. } = op {
                    for (pred, _) in operands {
                        check_block(*pred)?;
                    }
                }
            }
            for var in terminator.uses() {
                check_var(var)?;
            }
            for target in terminator.successors() {
                check_block(target)?;
            }
            if let Some(handler) = handler {
                check_block(handler)?;
            }
            blocks.push(BasicBlock {
                index,
                ops,
                terminator,
                handler,
            });
        }

        Ok(MethodBody {
            method: self.method,
            variables: self.variables,
            blocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Literal, PrimitiveKind, TypeName};

    fn method() -> MethodRef {
        MethodRef::new_instance(
            TypeName::new("Sample.Counter"),
            "Next",
            vec![RuntimeType::INT32],
            Some(RuntimeType::INT32),
        )
    }

    #[test]
    fn test_arguments_from_signature() {
        let builder = MethodBuilder::new(method(), &["step"]);
        assert_eq!(builder.argument(0).unwrap(), VarId::new(0));
        assert_eq!(builder.argument(1).unwrap(), VarId::new(1));
        assert!(builder.argument(2).is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut builder = MethodBuilder::new(method(), &["step"]);
        assert!(builder.local("step", RuntimeType::INT32).is_err());
        assert!(builder.local("total", RuntimeType::INT32).is_ok());
    }

    #[test]
    fn test_unterminated_block_rejected() {
        let mut builder = MethodBuilder::new(method(), &["step"]);
        builder.block();
        assert!(matches!(builder.build(), Err(Error::InvalidIdentity(_))));
    }

    #[test]
    fn test_double_definition_rejected() {
        let mut builder = MethodBuilder::new(method(), &["step"]);
        let t = builder.temp("t", RuntimeType::INT32).unwrap();
        let entry = builder.block();
        let one = Op::Const {
            dest: t,
            value: Literal::Int(PrimitiveKind::Int32, 1),
        };
        builder.push(entry, one.clone()).unwrap();
        builder.push(entry, one).unwrap();
        builder.terminate(entry, Terminator::Return(Some(t))).unwrap();
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_unknown_target_rejected() {
        let mut builder = MethodBuilder::new(method(), &["step"]);
        let entry = builder.block();
        builder.terminate(entry, Terminator::Jump(7)).unwrap();
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_terminated_block_is_sealed() {
        let mut builder = MethodBuilder::new(method(), &["step"]);
        let entry = builder.block();
        builder.terminate(entry, Terminator::Return(None)).unwrap();
        let x = builder.argument(1).unwrap();
        assert!(builder
            .push(entry, Op::Negate { dest: x, src: x })
            .is_err());
    }
}
