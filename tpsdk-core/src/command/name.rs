use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown driver command {0}")]
pub struct UnknownCommand(pub String);

macro_rules! command_names {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Canonical driver command names, as reported to the Agent.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum CommandName {
            $($variant),+
        }

        impl CommandName {
            pub const ALL: &'static [CommandName] = &[$(CommandName::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(CommandName::$variant => $name),+
                }
            }

            fn from_canonical(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(CommandName::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

command_names! {
    NewSession => "newSession",
    Quit => "quit",
    SetTimeout => "setTimeout",
    ImplicitlyWait => "implicitlyWait",
    Get => "get",
    GetCurrentUrl => "getCurrentUrl",
    GetTitle => "getTitle",
    GetPageSource => "getPageSource",
    GoBack => "goBack",
    GoForward => "goForward",
    Refresh => "refresh",
    Close => "close",
    GetWindowHandles => "getWindowHandles",
    GetCurrentWindowHandle => "getCurrentWindowHandle",
    SwitchToWindow => "switchToWindow",
    SwitchToFrame => "switchToFrame",
    FindElement => "findElement",
    FindElements => "findElements",
    FindChildElement => "findChildElement",
    FindChildElements => "findChildElements",
    ClickElement => "clickElement",
    ClearElement => "clearElement",
    SubmitElement => "submitElement",
    SendKeysToElement => "sendKeysToElement",
    SendKeysToActiveElement => "sendKeysToActiveElement",
    GetElementText => "getElementText",
    GetElementTagName => "getElementTagName",
    GetElementAttribute => "getElementAttribute",
    GetElementProperty => "getElementProperty",
    GetElementRect => "getElementRect",
    IsElementEnabled => "isElementEnabled",
    IsElementSelected => "isElementSelected",
    IsElementDisplayed => "isElementDisplayed",
    ExecuteScript => "executeScript",
    ExecuteAsyncScript => "executeAsyncScript",
    Screenshot => "screenshot",
    TakeElementScreenshot => "takeElementScreenshot",
    GetAllCookies => "getCookies",
    AddCookie => "addCookie",
    DeleteAllCookies => "deleteAllCookies",
    AcceptAlert => "acceptAlert",
    DismissAlert => "dismissAlert",
    GetAlertText => "getAlertText",
    SetAlertText => "setAlertText",
    Actions => "actions",
    HideKeyboard => "hideKeyboard",
    IsKeyboardShown => "isKeyboardShown",
    ResetApp => "resetApp",
}

/// WebDriver and mobile client spellings of canonical commands.
const ALIASES: &[(&str, CommandName)] = &[
    ("takeScreenshot", CommandName::Screenshot),
    ("navigateTo", CommandName::Get),
    ("getUrl", CommandName::GetCurrentUrl),
    ("back", CommandName::GoBack),
    ("forward", CommandName::GoForward),
    ("closeWindow", CommandName::Close),
    ("getWindowHandle", CommandName::GetCurrentWindowHandle),
    ("findElementFromElement", CommandName::FindChildElement),
    ("findElementsFromElement", CommandName::FindChildElements),
    ("elementClick", CommandName::ClickElement),
    ("elementClear", CommandName::ClearElement),
    ("elementSendKeys", CommandName::SendKeysToElement),
    ("getAllCookies", CommandName::GetAllCookies),
    ("performActions", CommandName::Actions),
    ("setImplicitTimeout", CommandName::SetTimeout),
    ("setTimeouts", CommandName::SetTimeout),
    ("deleteSession", CommandName::Quit),
];

impl CommandName {
    /// Resolves a canonical name or a known alias.
    pub fn resolve(name: &str) -> Option<Self> {
        Self::from_canonical(name).or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| *alias == name)
                .map(|(_, canonical)| *canonical)
        })
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandName::resolve(s).ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

impl Serialize for CommandName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CommandName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
