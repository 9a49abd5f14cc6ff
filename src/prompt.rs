// Hosts that get the persona block
pub const PERSONA_HOST_MARKERS: &[&str] = &["ryo.lu"];

pub const UNSPECIFIED_YEAR_HEADER: &str = "YEAR NOT SPECIFIED";
pub const FUTURE_HEADER: &str = "FUTURE DESIGN MODE";
pub const PAST_HEADER: &str = "HISTORICAL DESIGN MODE";
pub const CURRENT_HEADER: &str = "CURRENT DESIGN MODE";
pub const PERSONA_HEADER: &str = "DESIGNER PERSONA";
pub const RULES_HEADER: &str = "DELIVERABLE REQUIREMENTS";

/// Which era a requested year falls into relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearBucket {
    Unspecified,
    Past,
    Current,
    Future,
}

impl YearBucket {
    pub fn classify(year: Option<&str>, current_year: i32) -> Self {
        let Some(year) = year.map(str::trim).filter(|y| !y.is_empty()) else {
            return YearBucket::Unspecified;
        };
        match parse_year(year) {
            Some(y) if y > current_year => YearBucket::Future,
            Some(y) if y < current_year => YearBucket::Past,
            // Unreadable years are treated as today
            _ => YearBucket::Current,
        }
    }
}

/// Leading integer of `year`, negated for a `BC`/`BCE` suffix.
pub fn parse_year(year: &str) -> Option<i32> {
    let trimmed = year.trim();
    let (negative, digits_from) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let digits: String = digits_from.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let value: i32 = digits.parse().ok()?;

    let suffix = digits_from[digits.len()..].trim().to_ascii_uppercase();
    let before_common_era = suffix == "BC" || suffix == "BCE";
    if negative || before_common_era {
        Some(-value)
    } else {
        Some(value)
    }
}

fn has_persona_host(url: &str) -> bool {
    let candidate = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{}", url.trim())
    };
    let host = match url::Url::parse(&candidate) {
        Ok(parsed) => parsed.host_str().map(str::to_lowercase),
        Err(_) => None,
    };
    match host {
        Some(host) => PERSONA_HOST_MARKERS.iter().any(|marker| host.contains(marker)),
        None => false,
    }
}

pub fn build_system_prompt(year: Option<&str>, url: Option<&str>, current_year: i32) -> String {
    let url_text = url.unwrap_or("the requested page");
    let mut prompt = String::with_capacity(4096);

    prompt.push_str(&format!(
        "You are an expert web designer rebuilding {} as it would appear in a specific year.\n\n",
        url_text
    ));

    let year_text = year.map(str::trim).unwrap_or_default();
    match YearBucket::classify(year, current_year) {
        YearBucket::Unspecified => prompt.push_str(&format!(
            "{}:\nAssume the current year, {}. Recreate the page as it looks today.\n",
            UNSPECIFIED_YEAR_HEADER, current_year
        )),
        YearBucket::Future => prompt.push_str(&format!(
            "{}:\nThe year is {}. Imagine how {} will look {} years from now. Be bold: \
             redesign the layout, products and language around plausible technology and \
             culture of that time. Keep the brand recognizable but move it forward.\n",
            FUTURE_HEADER,
            year_text,
            url_text,
            parse_year(year_text).map(|y| y - current_year).unwrap_or(0)
        )),
        YearBucket::Past => prompt.push_str(&format!(
            "{}:\nThe year is {}. Rebuild {} using only the design language, technology, \
             vocabulary and content that existed then. If the site did not exist yet, \
             imagine what the organization or idea behind it would have published in that \
             era and medium.\n",
            PAST_HEADER, year_text, url_text
        )),
        YearBucket::Current => prompt.push_str(&format!(
            "{}:\nThe year is {}. Reproduce {} as accurately as possible, preserving its real \
             structure, navigation and copy. Do not invent features it does not have.\n",
            CURRENT_HEADER, year_text, url_text
        )),
    }

    if url.is_some_and(has_persona_host) {
        prompt.push('\n');
        prompt.push_str(PERSONA_HEADER);
        prompt.push_str(
            ":\nThis is the personal site of a product designer who builds playful, \
             nostalgic software. Favor warm minimalism, precise typography, generous \
             whitespace and small delightful details. Write in a friendly, concise first \
             person voice.\n",
        );
    }

    prompt.push('\n');
    prompt.push_str(RULES_HEADER);
    prompt.push_str(":\n");
    for (i, rule) in DELIVERABLE_RULES.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, rule));
    }
    prompt
}

const DELIVERABLE_RULES: &[&str] = &[
    "Return a single HTML fragment for the page body. No <html>, <head> or <body> tags, no markdown fences, no explanations.",
    "Style exclusively with inline Tailwind CSS utility classes. No <style> blocks, no external stylesheets, no scripts.",
    "Start the output with exactly one comment of the form <!-- TITLE: Page Title --> and never repeat it.",
    "Make the layout responsive so it works from narrow phone widths up to wide desktop windows.",
    "Use images only from https://image.pollinations.ai/prompt/<description> or emoji; never reference other image hosts or local files.",
    "Map fonts to the available families: serif text to font-serif, monospace to font-mono, everything else to font-sans.",
    "Write links as absolute https:// URLs with target=\"_blank\"; never use javascript: links or empty anchors.",
];
