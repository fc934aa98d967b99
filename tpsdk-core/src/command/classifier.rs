use super::name::CommandName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reportability {
    Reported,
    /// Session creation and teardown.
    SessionLifecycle,
    /// Implicit-timeout setup issued on the caller's behalf.
    Setup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: CommandName,
    pub reportability: Reportability,
    /// Keystroke command subject to redaction.
    pub redactable: bool,
    pub element_scoped: bool,
    /// Parameters the protocol expects for this command.
    pub parameters: &'static [&'static str],
}

impl CommandDescriptor {
    pub fn is_reported(&self) -> bool {
        self.reportability == Reportability::Reported
    }
}

pub fn describe(name: CommandName) -> CommandDescriptor {
    use CommandName::*;

    let reportability = match name {
        NewSession | Quit => Reportability::SessionLifecycle,
        SetTimeout | ImplicitlyWait => Reportability::Setup,
        _ => Reportability::Reported,
    };
    let redactable = matches!(name, SendKeysToElement | SendKeysToActiveElement);
    let element_scoped = matches!(
        name,
        FindChildElement
            | FindChildElements
            | ClickElement
            | ClearElement
            | SubmitElement
            | SendKeysToElement
            | GetElementText
            | GetElementTagName
            | GetElementAttribute
            | GetElementProperty
            | GetElementRect
            | IsElementEnabled
            | IsElementSelected
            | IsElementDisplayed
            | TakeElementScreenshot
    );
    let parameters: &'static [&'static str] = match name {
        NewSession => &["desiredCapabilities"],
        SetTimeout => &["implicit"],
        ImplicitlyWait => &["ms"],
        Get => &["url"],
        SwitchToWindow => &["handle"],
        SwitchToFrame => &["id"],
        FindElement | FindElements => &["using", "value"],
        FindChildElement | FindChildElements => &["id", "using", "value"],
        SendKeysToElement => &["id", "text", "value"],
        SendKeysToActiveElement => &["value"],
        GetElementAttribute | GetElementProperty => &["id", "name"],
        ExecuteScript | ExecuteAsyncScript => &["script", "args"],
        AddCookie => &["cookie"],
        SetAlertText => &["text"],
        Actions => &["actions"],
        _ if element_scoped => &["id"],
        _ => &[],
    };

    CommandDescriptor {
        name,
        reportability,
        redactable,
        element_scoped,
        parameters,
    }
}

/// Classifies a raw driver command name. `None` for names outside the
/// canonical set, which callers pass through unreported.
pub fn classify(driver_name: &str) -> Option<CommandDescriptor> {
    CommandName::resolve(driver_name).map(describe)
}
