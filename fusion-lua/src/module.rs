use mlua::prelude::*;

/// A binding the host injects into the pipeline sandbox.
///
/// Each module registers functions or values into the Lua global scope
/// under its `id()`.
///
/// # Example
///
/// ```rust
/// use fusion_lua::HostModule;
/// use mlua::prelude::*;
///
/// struct Site;
///
/// impl HostModule for Site {
///     fn id(&self) -> &'static str {
///         "site"
///     }
///
///     fn register(&self, lua: &Lua) -> LuaResult<()> {
///         let table = lua.create_table()?;
///         table.set("name", "my blog")?;
///         lua.globals().set(self.id(), table)?;
///         Ok(())
///     }
/// }
/// ```
pub trait HostModule: Send + Sync {
    /// Returns the unique identifier for this module.
    ///
    /// This is the global name scripts use to reach the module, so it must be
    /// a valid Lua identifier and unique within a registry.
    fn id(&self) -> &'static str;

    /// Registers this module's functions and values into the Lua context.
    fn register(&self, lua: &Lua) -> LuaResult<()>;
}

/// Ordered set of host modules loaded into every sandbox
pub struct ModuleRegistry {
    modules: Vec<Box<dyn HostModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Registers a module
    ///
    /// # Errors
    /// Fails if a module with the same id is already registered
    pub fn register<M: HostModule + 'static>(&mut self, module: M) -> LuaResult<()> {
        let id = module.id();
        if self.get(id).is_some() {
            return Err(LuaError::RuntimeError(format!(
                "Module with id '{}' is already registered",
                id
            )));
        }
        self.modules.push(Box::new(module));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&dyn HostModule> {
        self.modules
            .iter()
            .find(|m| m.id() == id)
            .map(|m| m.as_ref())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Registers all modules into a Lua context, in registration order
    ///
    /// # Errors
    /// Returns the first error encountered during registration
    pub fn register_all(&self, lua: &Lua) -> LuaResult<()> {
        for module in &self.modules {
            module.register(lua)?;
        }
        Ok(())
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
