use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Control is one administrative command. Everything it has to say, including usage errors, goes
/// back to the operator as text.
pub trait Control: Send + Sync {
    fn name(&self) -> &str;

    fn help(&self) -> &str;

    /// `args` excludes the command name itself.
    fn call(&self, args: &[&str]) -> String;
}

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("A control named \"{0}\" is already registered")]
    AlreadyRegistered(String),
}

/// Controls is the registry the operator-facing surface dispatches command lines into.
#[derive(Default)]
pub struct Controls {
    by_name: Mutex<BTreeMap<String, Arc<dyn Control>>>,
}

impl Controls {
    pub fn new() -> Self {
        Controls::default()
    }

    pub fn register(&self, control: Arc<dyn Control>) -> Result<(), ControlError> {
        let mut by_name = self.lock();
        let name = control.name().to_string();
        if by_name.contains_key(&name) {
            return Err(ControlError::AlreadyRegistered(name));
        }

        by_name.insert(name, control);
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.lock().remove(name).is_some()
    }

    /// Run a whitespace separated command line and return the text response.
    pub fn execute(&self, command_line: &str) -> String {
        let mut words = command_line.split_whitespace();
        let name = match words.next() {
            Some(name) => name,
            None => return self.help(),
        };
        let args: Vec<&str> = words.collect();

        if name == "help" && args.is_empty() {
            return self.help();
        }

        // Don't hold the registry lock while the control runs.
        let control = self.lock().get(name).cloned();
        match control {
            Some(control) => control.call(&args),
            None => format!("Unknown command \"{}\". Try \"help\".", name),
        }
    }

    fn help(&self) -> String {
        let by_name = self.lock();
        let mut text = String::from("Available commands:\n");
        for (name, control) in by_name.iter() {
            text.push_str(&format!("  {}: {}\n", name, control.help()));
        }

        text
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Arc<dyn Control>>> {
        self.by_name.lock().expect("Controls mutex guard poison")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Control for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn help(&self) -> &str {
            "Repeat the arguments."
        }

        fn call(&self, args: &[&str]) -> String {
            args.join(" ")
        }
    }

    #[test]
    fn execute_dispatches_by_name() {
        let controls = Controls::new();
        controls.register(Arc::new(Echo)).unwrap();

        assert_eq!(controls.execute("echo  a b"), "a b");
        assert_eq!(controls.execute("nope"), "Unknown command \"nope\". Try \"help\".");
        assert!(controls.execute("help").contains("echo: Repeat the arguments."));
        assert!(controls.execute("   ").starts_with("Available commands:"));
    }

    #[test]
    fn duplicate_names_rejected() {
        let controls = Controls::new();
        controls.register(Arc::new(Echo)).unwrap();

        assert_eq!(
            controls.register(Arc::new(Echo)),
            Err(ControlError::AlreadyRegistered("echo".to_string()))
        );
        assert!(controls.unregister("echo"));
        assert!(controls.register(Arc::new(Echo)).is_ok());
    }
}
