//! Built-in terminfo capabilities answered by XTGETTCAP.
//!
//! Non-parameterized string capabilities hold their expanded bytes (`\E` is
//! ESC); parameterized ones keep the literal `\E` so the application can feed
//! them to `tparm`. The table is sorted by name.

/// A capability value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapValue {
    Bool,
    Int(u32),
    Str(&'static str),
    /// `TN`: the terminal name, taken from the configuration.
    TermName,
}

impl CapValue {
    /// The value as transmitted: empty for booleans, decimal for numbers.
    #[must_use]
    pub fn render(self, term_name: &str) -> String {
        match self {
            Self::Bool => String::new(),
            Self::Int(n) => n.to_string(),
            Self::Str(s) => s.to_owned(),
            Self::TermName => term_name.to_owned(),
        }
    }
}

/// Look up a capability by name.
#[must_use]
pub fn lookup(name: &[u8]) -> Option<CapValue> {
    CAPABILITIES
        .binary_search_by(|(cap, _)| cap.as_bytes().cmp(name))
        .ok()
        .map(|idx| CAPABILITIES[idx].1)
}

/// Every capability, sorted by name.
pub static CAPABILITIES: &[(&str, CapValue)] = &[
    ("AX", CapValue::Bool),
    ("BD", CapValue::Str("\x1b[?2004l")),
    ("BE", CapValue::Str("\x1b[?2004h")),
    ("Co", CapValue::Int(256)),
    ("Cr", CapValue::Str("\x1b]112\x1b\\")),
    ("Cs", CapValue::Str("\\E]12;%p1%s\\E\\")),
    ("E3", CapValue::Str("\x1b[3J")),
    ("Ms", CapValue::Str("\\E]52;%p1%s;%p2%s\\E\\")),
    ("PE", CapValue::Str("\x1b[201~")),
    ("PS", CapValue::Str("\x1b[200~")),
    ("RGB", CapValue::Int(8)),
    ("RV", CapValue::Str("\x1b[>c")),
    ("Se", CapValue::Str("\x1b[ q")),
    ("Setulc", CapValue::Str("\\E[58:2::%p1%{65536}%/%d:%p1%{256}%/%{255}%&%d:%p1%{255}%&%dm")),
    ("Smulx", CapValue::Str("\\E[4:%p1%dm")),
    ("Ss", CapValue::Str("\\E[%p1%d q")),
    ("Su", CapValue::Bool),
    ("Sync", CapValue::Str("\\EP=%p1%ds\\E\\")),
    ("TN", CapValue::TermName),
    ("TS", CapValue::Str("\x1b]2;")),
    ("XF", CapValue::Bool),
    ("XM", CapValue::Str("\\E[?1006;1000%?%p1%{1}%=%th%el%;")),
    ("XR", CapValue::Str("\x1b[>0q")),
    ("XT", CapValue::Bool),
    ("am", CapValue::Bool),
    ("bce", CapValue::Bool),
    ("bel", CapValue::Str("^G")),
    ("blink", CapValue::Str("\x1b[5m")),
    ("bold", CapValue::Str("\x1b[1m")),
    ("cbt", CapValue::Str("\x1b[Z")),
    ("ccc", CapValue::Bool),
    ("civis", CapValue::Str("\x1b[?25l")),
    ("clear", CapValue::Str("\x1b[H\x1b[2J")),
    ("cnorm", CapValue::Str("\x1b[?12l\x1b[?25h")),
    ("colors", CapValue::Int(256)),
    ("cols", CapValue::Int(80)),
    ("cr", CapValue::Str("^M")),
    ("csr", CapValue::Str("\\E[%i%p1%d;%p2%dr")),
    ("cub", CapValue::Str("\\E[%p1%dD")),
    ("cub1", CapValue::Str("^H")),
    ("cud", CapValue::Str("\\E[%p1%dB")),
    ("cud1", CapValue::Str("^J")),
    ("cuf", CapValue::Str("\\E[%p1%dC")),
    ("cuf1", CapValue::Str("\x1b[C")),
    ("cup", CapValue::Str("\\E[%i%p1%d;%p2%dH")),
    ("cuu", CapValue::Str("\\E[%p1%dA")),
    ("cuu1", CapValue::Str("\x1b[A")),
    ("cvvis", CapValue::Str("\x1b[?12;25h")),
    ("dch", CapValue::Str("\\E[%p1%dP")),
    ("dch1", CapValue::Str("\x1b[P")),
    ("dim", CapValue::Str("\x1b[2m")),
    ("dl", CapValue::Str("\\E[%p1%dM")),
    ("dl1", CapValue::Str("\x1b[M")),
    ("dsl", CapValue::Str("\x1b]2;\x1b\\")),
    ("ech", CapValue::Str("\\E[%p1%dX")),
    ("ed", CapValue::Str("\x1b[J")),
    ("el", CapValue::Str("\x1b[K")),
    ("el1", CapValue::Str("\x1b[1K")),
    ("flash", CapValue::Str("\x1b]555\x1b\\")),
    ("fsl", CapValue::Str("\x1b\\")),
    ("home", CapValue::Str("\x1b[H")),
    ("hpa", CapValue::Str("\\E[%i%p1%dG")),
    ("ht", CapValue::Str("^I")),
    ("hts", CapValue::Str("\x1bH")),
    ("ich", CapValue::Str("\\E[%p1%d@")),
    ("il", CapValue::Str("\\E[%p1%dL")),
    ("il1", CapValue::Str("\x1b[L")),
    ("ind", CapValue::Str("^J")),
    ("indn", CapValue::Str("\\E[%p1%dS")),
    ("invis", CapValue::Str("\x1b[8m")),
    ("it", CapValue::Int(8)),
    ("kbs", CapValue::Str("^?")),
    ("kcub1", CapValue::Str("\x1bOD")),
    ("kcud1", CapValue::Str("\x1bOB")),
    ("kcuf1", CapValue::Str("\x1bOC")),
    ("kcuu1", CapValue::Str("\x1bOA")),
    ("kdch1", CapValue::Str("\x1b[3~")),
    ("kend", CapValue::Str("\x1bOF")),
    ("kf1", CapValue::Str("\x1bOP")),
    ("kf10", CapValue::Str("\x1b[21~")),
    ("kf11", CapValue::Str("\x1b[23~")),
    ("kf12", CapValue::Str("\x1b[24~")),
    ("kf2", CapValue::Str("\x1bOQ")),
    ("kf3", CapValue::Str("\x1bOR")),
    ("kf4", CapValue::Str("\x1bOS")),
    ("kf5", CapValue::Str("\x1b[15~")),
    ("kf6", CapValue::Str("\x1b[17~")),
    ("kf7", CapValue::Str("\x1b[18~")),
    ("kf8", CapValue::Str("\x1b[19~")),
    ("kf9", CapValue::Str("\x1b[20~")),
    ("khome", CapValue::Str("\x1bOH")),
    ("kich1", CapValue::Str("\x1b[2~")),
    ("km", CapValue::Bool),
    ("kmous", CapValue::Str("\x1b[M")),
    ("knp", CapValue::Str("\x1b[6~")),
    ("kpp", CapValue::Str("\x1b[5~")),
    ("lines", CapValue::Int(24)),
    ("mc5i", CapValue::Bool),
    ("mir", CapValue::Bool),
    ("msgr", CapValue::Bool),
    ("npc", CapValue::Bool),
    ("op", CapValue::Str("\x1b[39;49m")),
    ("pairs", CapValue::Int(65536)),
    ("rc", CapValue::Str("\x1b8")),
    ("rep", CapValue::Str("%p1%c\\E[%p2%{1}%-%db")),
    ("rev", CapValue::Str("\x1b[7m")),
    ("ri", CapValue::Str("\x1bM")),
    ("rin", CapValue::Str("\\E[%p1%dT")),
    ("ritm", CapValue::Str("\x1b[23m")),
    ("rmacs", CapValue::Str("\x1b(B")),
    ("rmam", CapValue::Str("\x1b[?7l")),
    ("rmcup", CapValue::Str("\x1b[?1049l\x1b[23;0;0t")),
    ("rmir", CapValue::Str("\x1b[4l")),
    ("rmkx", CapValue::Str("\x1b[?1l\x1b>")),
    ("rmso", CapValue::Str("\x1b[27m")),
    ("rmul", CapValue::Str("\x1b[24m")),
    ("rmxx", CapValue::Str("\x1b[29m")),
    ("rs1", CapValue::Str("\x1bc")),
    ("sc", CapValue::Str("\x1b7")),
    ("setab", CapValue::Str("\\E[%?%p1%{8}%<%t4%p1%d%e%p1%{16}%<%t10%p1%{8}%-%d%e48:5:%p1%d%;m")),
    ("setaf", CapValue::Str("\\E[%?%p1%{8}%<%t3%p1%d%e%p1%{16}%<%t9%p1%{8}%-%d%e38:5:%p1%d%;m")),
    ("sgr0", CapValue::Str("\x1b(B\x1b[m")),
    ("sitm", CapValue::Str("\x1b[3m")),
    ("smacs", CapValue::Str("\x1b(0")),
    ("smam", CapValue::Str("\x1b[?7h")),
    ("smcup", CapValue::Str("\x1b[?1049h\x1b[22;0;0t")),
    ("smir", CapValue::Str("\x1b[4h")),
    ("smkx", CapValue::Str("\x1b[?1h\x1b=")),
    ("smso", CapValue::Str("\x1b[7m")),
    ("smul", CapValue::Str("\x1b[4m")),
    ("smxx", CapValue::Str("\x1b[9m")),
    ("tbc", CapValue::Str("\x1b[3g")),
    ("tsl", CapValue::Str("\x1b]2;")),
    ("u6", CapValue::Str("\\E[%i%d;%dR")),
    ("u7", CapValue::Str("\x1b[6n")),
    ("u8", CapValue::Str("\\E[?%[;0123456789]c")),
    ("u9", CapValue::Str("\x1b[c")),
    ("vpa", CapValue::Str("\\E[%i%p1%dd")),
    ("xenl", CapValue::Bool),
];
