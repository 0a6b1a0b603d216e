use crate::api::models::{Contact, ContactUpdate, Group, GroupUpdate, NewContact, NewGroup};
use crate::error::{ConsoleError, Result};
use crate::import::split_list;

/// Raw text of the contact editor. Lists are comma separated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactForm {
    pub phone: String,
    pub name: String,
    pub notes: String,
    pub labels: String,
    pub groups: String,
    pub is_business: bool,
}

impl ContactForm {
    pub fn from_contact(c: &Contact) -> Self {
        Self {
            phone: c.phone.clone(),
            name: c.name.clone().unwrap_or_default(),
            notes: c.notes.clone().unwrap_or_default(),
            labels: c.labels.join(", "),
            groups: c.groups.join(", "),
            is_business: c.is_business,
        }
    }

    pub fn to_new(&self) -> Result<NewContact> {
        let phone = self.phone.trim();
        if phone.is_empty() {
            return Err(ConsoleError::Validation("Phone is required".into()));
        }
        Ok(NewContact {
            phone: phone.to_string(),
            name: optional(&self.name),
            notes: optional(&self.notes),
            labels: split_list(Some(&self.labels)),
            groups: split_list(Some(&self.groups)),
        })
    }

    /// Text fields are always sent so a cleared field clears on the backend,
    /// which skips `null`.
    pub fn to_update(&self) -> ContactUpdate {
        ContactUpdate {
            name: Some(self.name.trim().to_string()),
            notes: Some(self.notes.trim().to_string()),
            labels: split_list(Some(&self.labels)),
            groups: split_list(Some(&self.groups)),
            is_business: self.is_business,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupForm {
    pub group_id: String,
    pub name: String,
    pub description: String,
    pub participants: String,
    pub admins: String,
    pub is_active: bool,
}

impl Default for GroupForm {
    fn default() -> Self {
        Self {
            group_id: String::new(),
            name: String::new(),
            description: String::new(),
            participants: String::new(),
            admins: String::new(),
            is_active: true,
        }
    }
}

impl GroupForm {
    pub fn from_group(g: &Group) -> Self {
        Self {
            group_id: g.group_id.clone(),
            name: g.name.clone(),
            description: g.description.clone().unwrap_or_default(),
            participants: g.participants.join(", "),
            admins: g.admins.join(", "),
            is_active: g.is_active,
        }
    }

    pub fn to_new(&self) -> Result<NewGroup> {
        let group_id = self.group_id.trim();
        if group_id.is_empty() {
            return Err(ConsoleError::Validation("Group ID is required".into()));
        }
        Ok(NewGroup {
            group_id: group_id.to_string(),
            name: self.required_name()?,
            description: optional(&self.description),
            participants: split_list(Some(&self.participants)),
            admins: split_list(Some(&self.admins)),
        })
    }

    pub fn to_update(&self) -> Result<GroupUpdate> {
        Ok(GroupUpdate {
            name: self.required_name()?,
            description: Some(self.description.trim().to_string()),
            is_active: self.is_active,
        })
    }

    fn required_name(&self) -> Result<String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ConsoleError::Validation("Group name is required".into()));
        }
        Ok(name.to_string())
    }
}

fn optional(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}
