/// Which feature produced a response. Each maps to a fixed embed colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorTag {
    Moderation,
    Leveling,
    Music,
}

impl ColorTag {
    /// RGB value used for the embed sidebar.
    pub fn rgb(self) -> u32 {
        match self {
            ColorTag::Moderation => 0xFF0000,
            ColorTag::Leveling => 0x00FF00,
            ColorTag::Music => 0x0000FF,
        }
    }
}

/// Payload handed back to the gateway for every completed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub title: String,
    pub color_tag: ColorTag,
}

impl Response {
    pub fn new(title: impl Into<String>, color_tag: ColorTag) -> Self {
        Self {
            title: title.into(),
            color_tag,
        }
    }

    // ------------------------------------------------------------------
    // Leveling
    // ------------------------------------------------------------------

    pub fn cooldown_set(seconds: u64) -> Self {
        Self::new(
            format!("Level cooldown set to {} seconds.", seconds),
            ColorTag::Leveling,
        )
    }

    pub fn level_set(member: &str, level: u32) -> Self {
        Self::new(
            format!("{}'s level has been set to {}.", member, level),
            ColorTag::Leveling,
        )
    }

    pub fn role_for_level_set(role: &str, level: u32) -> Self {
        Self::new(
            format!("Role {} will be awarded at level {}.", role, level),
            ColorTag::Leveling,
        )
    }

    pub fn level_up(member: &str, level: u32) -> Self {
        Self::new(
            format!("{} reached level {}!", member, level),
            ColorTag::Leveling,
        )
    }

    pub fn member_reset(member: &str) -> Self {
        Self::new(
            format!("{}'s XP and level have been reset.", member),
            ColorTag::Leveling,
        )
    }

    // ------------------------------------------------------------------
    // Music
    // ------------------------------------------------------------------

    pub fn playing(url: &str) -> Self {
        Self::new(format!("Playing music from {}.", url), ColorTag::Music)
    }

    pub fn queued(url: &str, position: usize) -> Self {
        Self::new(
            format!("Queued {} at position {}.", url, position),
            ColorTag::Music,
        )
    }

    pub fn skipped() -> Self {
        Self::new("Skipped the current track.", ColorTag::Music)
    }

    pub fn left_voice() -> Self {
        Self::new("Left the voice channel.", ColorTag::Music)
    }

    // ------------------------------------------------------------------
    // Moderation
    // ------------------------------------------------------------------

    pub fn banned(member: &str) -> Self {
        Self::new(format!("{} has been banned.", member), ColorTag::Moderation)
    }

    pub fn unbanned(member: &str) -> Self {
        Self::new(format!("{} has been unbanned.", member), ColorTag::Moderation)
    }

    pub fn timed_out(member: &str, seconds: u64) -> Self {
        Self::new(
            format!("{} has been timed out for {} seconds.", member, seconds),
            ColorTag::Moderation,
        )
    }

    pub fn locked(channel: &str) -> Self {
        Self::new(format!("{} has been locked.", channel), ColorTag::Moderation)
    }

    pub fn unlocked(channel: &str) -> Self {
        Self::new(format!("{} has been unlocked.", channel), ColorTag::Moderation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_match_feature() {
        assert_eq!(ColorTag::Moderation.rgb(), 0xFF0000);
        assert_eq!(ColorTag::Leveling.rgb(), 0x00FF00);
        assert_eq!(ColorTag::Music.rgb(), 0x0000FF);
    }

    #[test]
    fn responses_carry_feature_tag() {
        assert_eq!(Response::cooldown_set(60).color_tag, ColorTag::Leveling);
        assert_eq!(Response::playing("u").color_tag, ColorTag::Music);
        assert_eq!(Response::banned("x").color_tag, ColorTag::Moderation);
    }

    #[test]
    fn titles_are_human_readable() {
        assert_eq!(
            Response::cooldown_set(30).title,
            "Level cooldown set to 30 seconds."
        );
        assert_eq!(
            Response::role_for_level_set("@Regular", 5).title,
            "Role @Regular will be awarded at level 5."
        );
        assert_eq!(
            Response::timed_out("bob", 90).title,
            "bob has been timed out for 90 seconds."
        );
    }
}
