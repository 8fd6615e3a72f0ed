//! Module dependency resolution.
//!
//! Depth-first over `Module::requires`. Each module is configured the first
//! time it is reached, so requirements that depend on settings are known
//! before they are followed. Modules without requirements move to the front
//! of the order; the others follow their requirements.

use crossbuild_core::{BuildContext, Error, ModuleSet};
use std::collections::{HashMap, VecDeque};

use crate::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

struct Resolver<'a> {
    available: &'a ModuleSet,
    ctx: &'a BuildContext,
    marks: HashMap<String, Mark>,
    order: VecDeque<String>,
}

/// Order `requested` and everything it transitively requires.
pub fn resolve(
    requested: &[String],
    available: &ModuleSet,
    ctx: &BuildContext,
) -> EngineResult<Vec<String>> {
    let mut resolver = Resolver {
        available,
        ctx,
        marks: HashMap::new(),
        order: VecDeque::new(),
    };
    for name in requested {
        resolver.visit(name)?;
    }
    Ok(resolver.order.into())
}

impl Resolver<'_> {
    fn visit(&mut self, name: &str) -> EngineResult<()> {
        match self.marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(EngineError::Cycle(name.to_string())),
            None => {}
        }

        let module = self
            .available
            .get(name)
            .ok_or_else(|| Error::UnknownModule(name.to_string()))?;
        self.marks.insert(name.to_string(), Mark::Visiting);
        module.configure(self.ctx)?;

        let requires = module.requires();
        if requires.is_empty() {
            self.order.push_front(name.to_string());
        } else {
            for dep in &requires {
                self.visit(dep)?;
            }
            self.order.push_back(name.to_string());
        }

        self.marks.insert(name.to_string(), Mark::Done);
        Ok(())
    }
}
