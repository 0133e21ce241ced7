use std::fmt;

/// AnkiConnect actions used by the gateway. The wire names are fixed by the add-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateDeck,
    AddNote,
    UpdateNoteFields,
    ReplaceTags,
    DeckNames,
    FindNotes,
    NotesInfo,
    DeleteNotes,
    DeleteDecks,
    FindCards,
    CardsInfo,
    Suspend,
    Unsuspend,
    ChangeDeck,
    GetDeckStats,
    ModelNames,
    ModelFieldNames,
    ModelTemplates,
    ModelStyling,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::CreateDeck => "createDeck",
            Action::AddNote => "addNote",
            Action::UpdateNoteFields => "updateNoteFields",
            Action::ReplaceTags => "replaceTags",
            Action::DeckNames => "deckNames",
            Action::FindNotes => "findNotes",
            Action::NotesInfo => "notesInfo",
            Action::DeleteNotes => "deleteNotes",
            Action::DeleteDecks => "deleteDecks",
            Action::FindCards => "findCards",
            Action::CardsInfo => "cardsInfo",
            Action::Suspend => "suspend",
            Action::Unsuspend => "unsuspend",
            Action::ChangeDeck => "changeDeck",
            Action::GetDeckStats => "getDeckStats",
            Action::ModelNames => "modelNames",
            Action::ModelFieldNames => "modelFieldNames",
            Action::ModelTemplates => "modelTemplates",
            Action::ModelStyling => "modelStyling",
        }
    }

    /// Actions whose remote contract answers a successful call with `result: null`.
    pub fn null_is_success(self) -> bool {
        matches!(
            self,
            Action::UpdateNoteFields
                | Action::ReplaceTags
                | Action::DeleteNotes
                | Action::DeleteDecks
                | Action::ModelStyling
                | Action::Suspend
                | Action::Unsuspend
                | Action::ChangeDeck
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
