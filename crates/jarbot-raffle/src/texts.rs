//! User-facing raffle messages.

pub const START: &str = "Розіграш стартує! Тримайтеся... 🎲";
pub const SELECTING: &str = "Обираю... 🔍";
pub const NOT_A_GROUP: &str = "Використайте /raffle у груповому чаті. 👥";
pub const ALREADY_RUNNING: &str = "Розіграш уже триває. ⏳";
pub const NO_PARTICIPANTS: &str = "Немає зареєстрованих користувачів. Попросіть /register. 📣";
pub const NO_ONE_TO_PICK: &str = "Немає доступних учасників для вибору.";

/// Flavor phrases posted between start and the winner announcement when the
/// config does not supply its own set.
pub const DEFAULT_PHRASES: &[&str] = &[
    "Кручу барабан... 🥁",
    "Хто ж сьогодні щасливчик? 🤔",
    "Доля вже вирішує... ✨",
    "Тримаємо кулаки! 🤞",
];

pub fn trigger_start(word: &str) -> String {
    format!("Тригер `{word}` спрацював. Розіграш стартує! 🎲")
}

pub fn winner(mention: &str, amount: i64, jar_url: &str) -> String {
    format!("Переможець: {mention}! 🎉\nДонат {amount} грн на цю банку: {jar_url} 💛")
}
