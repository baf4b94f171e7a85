//! Hand-written records shared by the unit tests of this crate.

use std::any::TypeId;

use crate::association::{AssociationInfo, AssociationShape};
use crate::error::{Error, Result};
use crate::field::FieldInfo;
use crate::record::{AssociationMut, AssociationRef, Record, RecordInfo};
use crate::value::{FromValue, ToValue, Value};

fn unknown(record: &str, column: &str) -> Error {
    Error::schema(format!("`{record}` has no column `{column}`"))
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub age: i32,
    pub address: Option<Address>,
    pub transactions: Option<Vec<Transaction>>,
}

impl Record for User {
    fn record_info() -> &'static RecordInfo {
        static INFO: RecordInfo = RecordInfo::new(
            "User",
            TypeId::of::<User>,
            &[
                FieldInfo::new("id").primary_key(true),
                FieldInfo::new("name"),
                FieldInfo::new("age"),
            ],
            &[
                AssociationInfo::new("address", AssociationShape::One, Address::record_info),
                AssociationInfo::new(
                    "transactions",
                    AssociationShape::Many,
                    Transaction::record_info,
                ),
            ],
        );
        &INFO
    }

    fn info(&self) -> &'static RecordInfo {
        Self::record_info()
    }

    fn get(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(self.id.to_value()),
            "name" => Some(self.name.to_value()),
            "age" => Some(self.age.to_value()),
            _ => None,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = FromValue::from_value(value)?,
            "name" => self.name = FromValue::from_value(value)?,
            "age" => self.age = FromValue::from_value(value)?,
            _ => return Err(unknown("User", column)),
        }
        Ok(())
    }

    fn association(&self, name: &str) -> Option<AssociationRef<'_>> {
        match name {
            "address" => Some(AssociationRef::One(&self.address)),
            "transactions" => Some(AssociationRef::Many(&self.transactions)),
            _ => None,
        }
    }

    fn association_mut(&mut self, name: &str) -> Option<AssociationMut<'_>> {
        match name {
            "address" => Some(AssociationMut::One(&mut self.address)),
            "transactions" => Some(AssociationMut::Many(&mut self.transactions)),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Address {
    pub id: i64,
    pub user_id: Option<i64>,
    pub street: String,
}

impl Record for Address {
    fn record_info() -> &'static RecordInfo {
        static INFO: RecordInfo = RecordInfo::new(
            "Address",
            TypeId::of::<Address>,
            &[
                FieldInfo::new("id"),
                FieldInfo::new("user_id"),
                FieldInfo::new("street"),
            ],
            &[],
        );
        &INFO
    }

    fn info(&self) -> &'static RecordInfo {
        Self::record_info()
    }

    fn get(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(self.id.to_value()),
            "user_id" => Some(self.user_id.to_value()),
            "street" => Some(self.street.to_value()),
            _ => None,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = FromValue::from_value(value)?,
            "user_id" => self.user_id = FromValue::from_value(value)?,
            "street" => self.street = FromValue::from_value(value)?,
            _ => return Err(unknown("Address", column)),
        }
        Ok(())
    }

    fn association(&self, _name: &str) -> Option<AssociationRef<'_>> {
        None
    }

    fn association_mut(&mut self, _name: &str) -> Option<AssociationMut<'_>> {
        None
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub item: String,
}

impl Record for Transaction {
    fn record_info() -> &'static RecordInfo {
        static INFO: RecordInfo = RecordInfo::new(
            "Transaction",
            TypeId::of::<Transaction>,
            &[
                FieldInfo::new("id"),
                FieldInfo::new("user_id"),
                FieldInfo::new("item"),
            ],
            &[],
        );
        &INFO
    }

    fn info(&self) -> &'static RecordInfo {
        Self::record_info()
    }

    fn get(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(self.id.to_value()),
            "user_id" => Some(self.user_id.to_value()),
            "item" => Some(self.item.to_value()),
            _ => None,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = FromValue::from_value(value)?,
            "user_id" => self.user_id = FromValue::from_value(value)?,
            "item" => self.item = FromValue::from_value(value)?,
            _ => return Err(unknown("Transaction", column)),
        }
        Ok(())
    }

    fn association(&self, _name: &str) -> Option<AssociationRef<'_>> {
        None
    }

    fn association_mut(&mut self, _name: &str) -> Option<AssociationMut<'_>> {
        None
    }
}
