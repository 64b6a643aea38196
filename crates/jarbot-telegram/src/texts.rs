//! User-facing command texts and help screens.

pub const START_TEXT: &str = "Привіт! Я @DonationRaffleBot 🎲\n\n\
1️⃣ Додайте мене в групу.\n\
2️⃣ Адмін налаштовує банку: /configure `https://...`\n\
3️⃣ За потреби задайте ліміти: /configure `<мін>` `<макс>`\n\
4️⃣ Учасники реєструються /register (або пишуть у чат, якщо ввімкнена автореєстрація).\n\n\
Далі запускайте /raffle або налаштуйте розклад. Маленькі донати регулярно — і разом. 🇺🇦";

pub const INFO_TEXT: &str = "Привіт! Я @DonationRaffleBot 🎲\n\n\
Я тут, щоб робити донати було трішки веселіше 🎉.\n\n\
1️⃣ *Спочатку реєстрація*.\n\
Учасники можуть зареєструватися командою /register або просто написати будь-що в чат, \
і я автоматично додам їх до списку.\n\
Якщо не хочеш брати участь, завжди можна вийти командою /eject.\n\n\
2️⃣ *Потім гра*.\n\
Коли хтось пише /raffle, починається магія ✨\n\
Я випадково обираю одного учасника, якому випадає\n\
💸 задонатити на банку для допомоги ЗСУ.\n\n\
🎯 Все прозоро, випадково і без зайвого пафосу\n\
🇺🇦 Маленькі донати, але регулярно і разом\n\n\
Готові?\n👉 /register і нехай вирішує доля 😉";

pub const COMMAND_HELP: &str = "*Основне*\n\
/register — Зареєструватися\n\
/eject — Видалити себе\n\
/list — Показати зареєстрованих\n\
/raffle — Запустити розіграш\n\
/cancel — Скасувати активний розіграш\n\
/stats — Топ переможців\n\
/info — Про бота\n\
/help — Показати довідку\n\
/help schedule — Довідка по розкладу\n\n\
*Налаштування (/configure, лише адміністратор)*\n\
/configure `https://...` — Банка для групи\n\
/configure `<мін>` `<макс>` — Ліміти донату\n\
/configure auto-register `on|off` — Автореєстрація\n\
/configure schedule ... — Розклад розіграшів\n\
/configure trigger — Список тригерів\n\
/configure trigger + `<слово>` — Додати тригер\n\
/configure trigger - `<слово>` — Видалити тригер";

pub const SCHEDULE_HELP: &str = "*Розклад розіграшів*\n\
Налаштування доступне лише адміністраторам.\n\n\
*Формати*\n\
`daily HH:MM` — щодня\n\
`weekdays HH:MM` — у будні (пн-пт)\n\
`weekly mon HH:MM` — щотижня у вибраний день\n\
`every Nh` — кожні N годин\n\
`every Nd` — кожні N днів\n\
`off` — вимкнути розклад\n\n\
*Приклади*\n\
/configure schedule `daily 09:00`\n\
/configure schedule `weekdays 12:30`\n\
/configure schedule `weekly fri 20:00`\n\
/configure schedule `every 6h`\n\
/configure schedule `off`\n\n\
Розклад працює за часовим поясом `Europe/Kyiv`.\n\
Хвилинні інтервали не підтримуються.";

pub const CONFIGURE_USAGE: &str = "Використайте /configure `https://...`, \
/configure `<мін>` `<макс>`, /configure auto-register `on|off`, \
/configure schedule ... або /configure trigger + `<слово>`.";

pub const NEED_GROUP_CONFIGURE: &str = "Використайте /configure у груповому чаті.";
pub const ADMINS_ONLY: &str = "Налаштовувати може лише адміністратор групи.";
pub const NEED_USER: &str =
    "Потрібен користувач. Використайте /register у приватному або груповому чаті. 👤";
pub const BOTS_CANNOT_REGISTER: &str = "Боти не можуть реєструватися. 🤖";
pub const ALREADY_REGISTERED: &str = "Ви вже зареєстровані. ✅";
pub const NOT_REGISTERED: &str = "Ви не зареєстровані. ℹ️";
pub const EJECTED: &str = "Вас видалено зі списку. 🧹";
pub const EMPTY_LIST: &str = "Поки немає зареєстрованих користувачів. 📭";
pub const NO_WINNERS_YET: &str = "Ще немає переможців.";
pub const NO_ACTIVE_RAFFLE: &str = "Зараз немає активного розіграшу. ℹ️";
pub const RAFFLE_CANCELLED: &str = "Розіграш скасовано. 🛑";
pub const SCHEDULE_DISABLED: &str = "Розклад вимкнено.";
pub const BAD_JAR_URL: &str = "Невірне посилання. Використайте /configure `https://...`";
pub const BAD_LIMITS: &str =
    "Ліміти мають бути додатніми числами, де мін не більший за макс.";
pub const TRIGGER_USAGE: &str =
    "Використайте /configure trigger + `<слово>` або /configure trigger - `<слово>`.";
pub const NO_TRIGGERS: &str = "Поки немає тригерів. Додайте: /configure trigger + `<слово>`.";

pub fn greeting(bot_username: Option<&str>) -> String {
    let handle = bot_username
        .map(|name| format!(" @{name}"))
        .unwrap_or_default();
    format!(
        "Привіт!\n\nДякую, що додали мене. Я{handle} — Telegram-бот, що допомагає донатити \
         регулярно.\nЩоб дізнатися більше, викличіть /info."
    )
}

pub fn registered(mention: &str) -> String {
    format!("Зареєстровано: {mention}. ✅")
}

pub fn auto_registered(mention: &str) -> String {
    format!("Додано до списку: {mention}. Якщо не хочеш брати участь — /eject.")
}

pub fn participant_list(lines: &str, count: usize) -> String {
    format!("Зареєстровані користувачі ({count}):\n{lines}")
}

pub fn auto_register_state(enabled: bool) -> String {
    let status = if enabled { "увімкнено" } else { "вимкнено" };
    format!("Поточний стан: {status}. Використайте /configure auto-register `on|off`.")
}

pub fn auto_register_set(enabled: bool) -> String {
    let status = if enabled { "увімкнено" } else { "вимкнено" };
    format!("Автореєстрацію {status}.")
}

pub fn current_schedule(schedule: Option<&str>) -> String {
    let formatted = schedule
        .map(|text| format!("`{text}`"))
        .unwrap_or_else(|| "(не налаштовано)".to_string());
    format!("Поточний розклад: {formatted}.\nВикористайте /help schedule для формату.")
}

pub fn schedule_saved(normalized: &str) -> String {
    format!("Розклад збережено: `{normalized}`.")
}

pub fn trigger_list(words: &[String]) -> String {
    let formatted: Vec<String> = words.iter().map(|word| format!("`{word}`")).collect();
    format!("Тригери ({}): {}", words.len(), formatted.join(", "))
}

pub fn trigger_added(word: &str) -> String {
    format!("Тригер додано: {word}")
}

pub fn trigger_exists(word: &str) -> String {
    format!("Тригер вже існує: {word}")
}

pub fn trigger_removed(word: &str) -> String {
    format!("Тригер видалено: {word}")
}

pub fn trigger_missing(word: &str) -> String {
    format!("Тригера немає: {word}")
}

pub fn limits_saved(min: i64, max: i64) -> String {
    format!("Ліміти донату оновлено: від {min} до {max} грн.")
}

pub fn jar_saved(url: &str) -> String {
    format!("Посилання на банку збережено: {url}")
}
