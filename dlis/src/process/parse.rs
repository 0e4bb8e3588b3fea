use std::io::Read;

use anyhow::{Result, bail};

use crate::process::read::RecordReader;
use crate::structs::component::{ComponentDescriptor, Role};
use crate::structs::model::{Attribute, Model, ObjectId, Set, SetId};
use crate::structs::rep_code::RepCode;
use crate::structs::value::{ObjectName, ReadBytes, Value, read_ident, read_uvari};
use crate::utils::arena::Span;
use crate::utils::errors::{ComponentError, ValueError};

/// Values reserved up front per attribute; larger counts grow on demand.
const MAX_PREALLOCATED_VALUES: usize = 1024;

/// Decodes explicitly formatted logical records into the object model.
#[derive(Default)]
pub struct Parser {
    state: ParserState,
}

impl Parser {
    /// Decodes every component of the current logical record.
    ///
    /// The reader must be positioned at the start of the record's first
    /// segment. Returns once the last segment of the record is consumed.
    pub fn parse_record<R: Read>(
        &mut self,
        reader: &mut RecordReader<R>,
        model: &mut Model,
    ) -> Result<()> {
        self.state.begin_record(reader.header().record_type);

        while !reader.at_record_end() {
            self.parse_component(reader, model)?;
        }

        Ok(())
    }

    /// Decodes one component from any byte source.
    pub fn parse_component<B: ReadBytes>(&mut self, reader: &mut B, model: &mut Model) -> Result<()> {
        let descriptor = ComponentDescriptor::from_byte(reader.read_u8()?)?;
        self.state.components += 1;

        match descriptor.role {
            role if role.is_set() => self.read_set(descriptor, reader, model),
            Role::Object => self.read_object(descriptor, reader, model),
            _ => self.read_attribute(descriptor, reader, model),
        }
    }

    /// Starts a new logical record of the given EFLR type.
    pub fn begin_record(&mut self, record_type: u8) {
        self.state.begin_record(record_type);
    }

    pub fn state(&self) -> ComponentState {
        self.state.component_state
    }

    fn read_set<B: ReadBytes>(
        &mut self,
        descriptor: ComponentDescriptor,
        reader: &mut B,
        model: &mut Model,
    ) -> Result<()> {
        let set_type = if descriptor.has(ComponentDescriptor::SET_TYPE) {
            read_ident(reader)?
        } else {
            log::warn!("Set component without a type");
            String::new()
        };
        let name = if descriptor.has(ComponentDescriptor::SET_NAME) {
            Some(read_ident(reader)?)
        } else {
            None
        };

        log::debug!(
            "Set {set_type:?} (record type {}, {:?})",
            self.state.record_type,
            descriptor.role
        );

        let id = model.add_set(Set::new(self.state.record_type, set_type, name));
        self.state.current_set = Some(id);
        self.state.current_object = None;
        self.state.component_state = ComponentState::Set;

        Ok(())
    }

    fn read_object<B: ReadBytes>(
        &mut self,
        descriptor: ComponentDescriptor,
        reader: &mut B,
        model: &mut Model,
    ) -> Result<()> {
        let set = self
            .state
            .current_set
            .ok_or(ComponentError::ObjectWithoutSet)?;

        let name = if descriptor.has(ComponentDescriptor::OBJECT_NAME) {
            ObjectName::read(reader)?
        } else {
            log::warn!("Object component without a name");
            ObjectName::default()
        };

        log::trace!("Object {name}");

        self.state.current_object = Some(model.add_object(set, name));
        self.state.component_state = ComponentState::Object;

        Ok(())
    }

    fn read_attribute<B: ReadBytes>(
        &mut self,
        descriptor: ComponentDescriptor,
        reader: &mut B,
        model: &mut Model,
    ) -> Result<()> {
        let set = self
            .state
            .current_set
            .ok_or(ComponentError::AttributeWithoutSet)?;

        let label = if descriptor.has(ComponentDescriptor::ATTR_LABEL) {
            Some(read_ident(reader)?)
        } else {
            None
        };
        let count = if descriptor.has(ComponentDescriptor::ATTR_COUNT) {
            Some(read_uvari(reader)?)
        } else {
            None
        };
        let code = if descriptor.has(ComponentDescriptor::ATTR_REP_CODE) {
            let raw = reader.read_u8()?;
            let code = RepCode::from_u8(raw);
            if code.is_none() {
                log::warn!("Undefined representation code {raw}");
            }
            Some(code)
        } else {
            None
        };
        let units = if descriptor.has(ComponentDescriptor::ATTR_UNITS) {
            Some(read_ident(reader)?)
        } else {
            None
        };
        let absent = descriptor.role == Role::AbsentAttribute;
        let has_value = descriptor.has(ComponentDescriptor::ATTR_VALUE) && !absent;

        match self.state.component_state {
            ComponentState::Set | ComponentState::Template => {
                self.state.component_state = ComponentState::Template;

                let mut column = Attribute {
                    label: label.unwrap_or_default(),
                    count: count.unwrap_or(1),
                    code: code.unwrap_or(Some(RepCode::Ident)),
                    units,
                    values: Span::empty(),
                    absent,
                };
                if has_value {
                    column.values = read_values(reader, &column, model)?;
                }

                log::trace!("Column {:?} ({:?})", column.label, column.code);
                model.add_column(set, column);
            }
            ComponentState::Object | ComponentState::Attribute => {
                self.state.component_state = ComponentState::Attribute;

                let object = self
                    .state
                    .current_object
                    .ok_or(ComponentError::AttributeWithoutSet)?;
                let template = column_for(model, set, object)?;

                let mut attribute = Attribute {
                    label: label.unwrap_or_else(|| template.label.clone()),
                    count: count.unwrap_or(template.count),
                    code: code.unwrap_or(template.code),
                    units: units.or_else(|| template.units.clone()),
                    values: Span::empty(),
                    absent,
                };
                if has_value {
                    attribute.values = read_values(reader, &attribute, model)?;
                } else if !absent {
                    attribute.values = template.values;
                    if attribute.count as usize != template.values.len() {
                        if count.is_some() {
                            log::warn!(
                                "Attribute {:?} declares {} values but inherits {} from its column",
                                attribute.label,
                                attribute.count,
                                template.values.len()
                            );
                        }
                        attribute.count = template.values.len() as u32;
                    }
                }

                model.add_attribute(object, attribute);
            }
            ComponentState::Idle => bail!(ComponentError::AttributeWithoutSet),
        }

        Ok(())
    }
}

/// Template column at the position the object's next attribute takes.
fn column_for(model: &Model, set: SetId, object: ObjectId) -> Result<Attribute> {
    let columns = &model.set(set).columns;
    let ordinal = model.object(object).attributes.len();

    match columns.get(ordinal) {
        Some(&column) => Ok(model.attribute(column).clone()),
        None => bail!(ComponentError::TooManyAttributes {
            object: model.object(object).name.clone(),
            columns: columns.len(),
        }),
    }
}

fn read_values<B: ReadBytes>(
    reader: &mut B,
    attribute: &Attribute,
    model: &mut Model,
) -> Result<Span<Value>> {
    let Some(code) = attribute.code else {
        bail!(ValueError::UndefinedCode(attribute.label.clone()));
    };

    let count = attribute.count as usize;
    let mut values = Vec::with_capacity(count.min(MAX_PREALLOCATED_VALUES));
    for _ in 0..count {
        values.push(Value::read(reader, code)?);
    }

    Ok(model.alloc_values(values))
}

/// Position of the component decoder within the current set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComponentState {
    #[default]
    Idle,
    Set,
    Template,
    Object,
    Attribute,
}

#[derive(Debug, Default)]
pub struct ParserState {
    pub component_state: ComponentState,
    pub record_type: u8,
    pub current_set: Option<SetId>,
    pub current_object: Option<ObjectId>,
    pub components: usize,
}

impl ParserState {
    fn begin_record(&mut self, record_type: u8) {
        self.record_type = record_type;
        self.component_state = ComponentState::Idle;
        self.current_set = None;
        self.current_object = None;
    }
}
