//! # Help Text
//!
//! Help message for bot commands.
//! Displayed to the user via the `.help` command.

pub const MAIN: &str = concat!(
    "**🤖 Relay Help**\n",
    "Use: .command _args_\n",
    "\n",
    "**⚡ Misc**\n",
    "* ping: Check the bot is reachable\n",
    "* echo [text]: Repeat text back\n",
    "\n",
    "**📊 Admin**\n",
    "* stats: Delivery statistics\n",
    "* stats reset: Reset statistics (admins only)\n",
    "\n",
    "* help: Show this message\n",
);
