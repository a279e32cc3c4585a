#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Locale {
    Fr,
    En,
}

impl Locale {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "fr" => Some(Locale::Fr),
            "en" => Some(Locale::En),
            _ => None,
        }
    }

    fn header(&self) -> &'static str {
        match self {
            Locale::Fr => "[FR]🥖",
            Locale::En => "[EN]🌏",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKey {
    /// Panel posted in the entry channel.
    Instructions,
    /// First message of a ticket channel.
    Welcome,
    Denied,
    NotATicketChannel,
    TicketCreated,
    /// Reply when a button press could not be carried out.
    Failed,
    Hello,
}

fn template(key: MessageKey, locale: Locale) -> &'static str {
    use Locale::*;
    use MessageKey::*;
    match (key, locale) {
        (Instructions, Fr) => "\
Bonjour. Si tu as un problème avec Silex ou la Renderfarm, tu peux créer un ticket qui contactera automatiquement la team {support}.
Clique sur le bouton \"Ticket Silex\" si le problème est sur Silex.
Clique sur le bouton \"Ticket Farm\" si le problème a lieu sur la Renderfarm.

Si le bot ne fonctionne pas, adresse ton problème à cette adresse mail : {email}",
        (Instructions, En) => "\
Hello. If you have a problem with Silex or the Renderfarm, you can create a ticket that will automatically contact the {support} team.
Click on the \"Ticket Silex\" button if the problem is with Silex.
Click on the \"Ticket Farm\" button if the problem is on the Renderfarm.

If the bot is not working, please explain your problem by mail : {email}",
        (Welcome, Fr) => "\
Salut {user} ! Explique nous ton problème en rapport avec la/le {kind}.
Donne nous le plus de détails possible pour nous aider à régler le problème (numéro du PC, ton numéro de salle, des screenshot/vidéos, quelles actions ont déclenchées ton problème etc.)

La team {support} revient vers toi au plus tôt!",
        (Welcome, En) => "\
Hi {user} ! Tell us about your problem with the {kind}.
Give us as many details as possible to help us fix the problem (PC number, your room number, screenshots/videos, what actions triggered your problem etc.).

The {support} team will get back to you as soon as possible!",
        (Denied, Fr) => "Vous n'avez pas la permission d'utiliser cette commande.",
        (Denied, En) => "You do not have permission to use this command.",
        (NotATicketChannel, Fr) => "Cette commande ne peut être utilisée que dans un ticket.",
        (NotATicketChannel, En) => "This command can only be used in ticket channels.",
        (TicketCreated, Fr) => "Ton ticket a été créé : {channel}",
        (TicketCreated, En) => "Your ticket has been created: {channel}",
        (Failed, Fr) => "Une erreur est survenue, réessaie plus tard.",
        (Failed, En) => "Something went wrong, please try again later.",
        (Hello, Fr) => "Bonjour !",
        (Hello, En) => "Hello!",
    }
}

/// Renders templates in every configured locale, one section per locale.
#[derive(Clone, Debug)]
pub struct Catalog {
    locales: Vec<Locale>,
}

impl Catalog {
    pub fn new(locales: Vec<Locale>) -> Self {
        Self { locales }
    }

    pub fn render(&self, key: MessageKey, vars: &[(&str, &str)]) -> String {
        let sections: Vec<String> = self
            .locales
            .iter()
            .map(|locale| {
                let text = substitute(template(key, *locale), vars);
                if self.locales.len() > 1 {
                    format!("{}\n{}", locale.header(), text)
                } else {
                    text
                }
            })
            .collect();
        sections.join("\n\n")
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(vec![Locale::Fr, Locale::En])
    }
}

fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |text, (name, value)| {
        text.replace(&format!("{{{name}}}"), value)
    })
}
