//! Unit tests for lowering.

use inkwell::{
    basic_block::BasicBlock,
    context::Context,
    module::Module,
    values::{AnyValue, FunctionValue, InstructionOpcode, InstructionValue},
};

use crate::{
    ast::{
        ast::{Local, Program},
        expressions::{BinaryOperator, Expr},
        statements::{Formal, Header, Stmt},
        types::Type,
    },
    compiler::compiler::{compile, compile_program, CompileOptions},
};

fn lower<'a>(context: &'a Context, mut program: Program) -> Module<'a> {
    compile_program(context, &mut program, &CompileOptions::default()).unwrap()
}

fn function<'a>(module: &Module<'a>, name: &str) -> FunctionValue<'a> {
    module.get_function(name).unwrap()
}

fn block_named<'a>(function: FunctionValue<'a>, name: &str) -> BasicBlock<'a> {
    function
        .get_basic_blocks()
        .into_iter()
        .find(|block| block.get_name().to_str() == Ok(name))
        .unwrap()
}

/// Targets of the block's terminator, taken edge first.
fn successors<'a>(block: BasicBlock<'a>) -> Vec<BasicBlock<'a>> {
    let terminator = match block.get_terminator() {
        Some(terminator) => terminator,
        None => return vec![],
    };
    let mut successors = (0..terminator.get_num_operands())
        .filter_map(|index| terminator.get_operand(index))
        .filter_map(|operand| operand.right())
        .collect::<Vec<_>>();
    // A conditional branch lists its false target first.
    successors.reverse();
    successors
}

/// Blocks reachable from the entry, following only the taken edge of a
/// branch on a constant condition.
fn reachable<'a>(function: FunctionValue<'a>) -> Vec<BasicBlock<'a>> {
    let mut seen = vec![];
    let mut pending = function.get_first_basic_block().into_iter().collect::<Vec<_>>();
    while let Some(block) = pending.pop() {
        if seen.contains(&block) {
            continue;
        }
        seen.push(block);

        let mut next = successors(block);
        let constant = block
            .get_terminator()
            .filter(|terminator| terminator.get_num_operands() == 3)
            .and_then(|terminator| terminator.get_operand(0))
            .and_then(|operand| operand.left())
            .and_then(|condition| condition.into_int_value().get_zero_extended_constant());
        match constant {
            Some(0) => {
                next.remove(0);
            }
            Some(_) => next.truncate(1),
            None => {}
        }
        pending.extend(next);
    }
    seen
}

fn instructions<'a>(function: FunctionValue<'a>) -> Vec<InstructionValue<'a>> {
    let mut all = vec![];
    for block in function.get_basic_blocks() {
        let mut next = block.get_first_instruction();
        while let Some(instruction) = next {
            all.push(instruction);
            next = instruction.get_next_instruction();
        }
    }
    all
}

fn count(function: FunctionValue, opcode: InstructionOpcode) -> usize {
    instructions(function)
        .iter()
        .filter(|instruction| instruction.get_opcode() == opcode)
        .count()
}

fn listing(function: FunctionValue) -> String {
    function.print_to_string().to_string()
}

fn integer_program(body: Vec<Stmt>) -> Program {
    Program::new(
        "demo",
        vec![
            Local::variables(&["i", "j"], Type::Integer),
            Local::variables(&["r"], Type::Real),
            Local::variables(&["b"], Type::Boolean),
        ],
        body,
    )
}

#[test]
fn test_literal_true_if_converges_on_merge() {
    let context = Context::create();
    let module = lower(
        &context,
        integer_program(vec![Stmt::if_else(
            Expr::boolean(true),
            Stmt::assign(Expr::symbol("i"), Expr::integer(1)),
            Stmt::assign(Expr::symbol("i"), Expr::integer(2)),
        )]),
    );
    let main = function(&module, "main");

    let entry = main.get_first_basic_block().unwrap();
    let then_block = block_named(main, "then");
    let else_block = block_named(main, "else");
    let merge = block_named(main, "ifcont");

    assert_eq!(successors(entry), vec![then_block, else_block]);
    assert_eq!(successors(then_block), vec![merge]);
    assert_eq!(successors(else_block), vec![merge]);

    let reachable = reachable(main);
    assert!(reachable.contains(&then_block));
    assert!(reachable.contains(&merge));
    assert!(!reachable.contains(&else_block));
}

#[test]
fn test_if_without_else_still_has_three_blocks() {
    let context = Context::create();
    let module = lower(
        &context,
        integer_program(vec![Stmt::if_then(
            Expr::symbol("b"),
            Stmt::assign(Expr::symbol("i"), Expr::integer(1)),
        )]),
    );
    let main = function(&module, "main");

    let else_block = block_named(main, "else");
    let merge = block_named(main, "ifcont");
    let only = else_block.get_first_instruction().unwrap();
    assert_eq!(only.get_opcode(), InstructionOpcode::Br);
    assert_eq!(successors(else_block), vec![merge]);
    assert_eq!(reachable(main).len(), 4);
}

#[test]
fn test_while_has_loop_back_edge() {
    let context = Context::create();
    let module = lower(
        &context,
        integer_program(vec![Stmt::while_do(
            Expr::binary(Expr::symbol("i"), BinaryOperator::Less, Expr::integer(10)),
            Stmt::assign(
                Expr::symbol("i"),
                Expr::binary(Expr::symbol("i"), BinaryOperator::Plus, Expr::integer(1)),
            ),
        )]),
    );
    let main = function(&module, "main");

    let cond = block_named(main, "whilecond");
    let body = block_named(main, "whilebody");
    let end = block_named(main, "whileend");
    assert_eq!(successors(main.get_first_basic_block().unwrap()), vec![cond]);
    assert_eq!(successors(cond), vec![body, end]);
    assert_eq!(successors(body), vec![cond]);
    assert_eq!(
        end.get_terminator().unwrap().get_opcode(),
        InstructionOpcode::Return
    );
}

#[test]
fn test_arithmetic_dispatches_on_static_types() {
    let context = Context::create();
    let module = lower(
        &context,
        integer_program(vec![
            Stmt::assign(
                Expr::symbol("j"),
                Expr::binary(Expr::symbol("i"), BinaryOperator::Star, Expr::integer(2)),
            ),
            Stmt::assign(
                Expr::symbol("r"),
                Expr::binary(Expr::symbol("i"), BinaryOperator::Plus, Expr::symbol("r")),
            ),
        ]),
    );
    let main = function(&module, "main");

    assert_eq!(count(main, InstructionOpcode::Mul), 1);
    assert_eq!(count(main, InstructionOpcode::FAdd), 1);
    assert_eq!(count(main, InstructionOpcode::Add), 0);
    assert_eq!(count(main, InstructionOpcode::SIToFP), 1);
}

#[test]
fn test_division_operators() {
    let context = Context::create();
    let module = lower(
        &context,
        integer_program(vec![
            Stmt::assign(
                Expr::symbol("r"),
                Expr::binary(Expr::symbol("i"), BinaryOperator::Slash, Expr::symbol("j")),
            ),
            Stmt::assign(
                Expr::symbol("i"),
                Expr::binary(Expr::symbol("i"), BinaryOperator::Div, Expr::symbol("j")),
            ),
            Stmt::assign(
                Expr::symbol("j"),
                Expr::binary(Expr::symbol("i"), BinaryOperator::Mod, Expr::symbol("j")),
            ),
        ]),
    );
    let main = function(&module, "main");

    assert_eq!(count(main, InstructionOpcode::FDiv), 1);
    assert_eq!(count(main, InstructionOpcode::SDiv), 1);
    assert_eq!(count(main, InstructionOpcode::SRem), 1);
    assert_eq!(count(main, InstructionOpcode::SIToFP), 2);
}

#[test]
fn test_logical_and_comparisons() {
    let context = Context::create();
    let module = lower(
        &context,
        integer_program(vec![Stmt::assign(
            Expr::symbol("b"),
            Expr::binary(
                Expr::binary(Expr::symbol("i"), BinaryOperator::LessEquals, Expr::symbol("j")),
                BinaryOperator::And,
                Expr::binary(Expr::symbol("r"), BinaryOperator::Greater, Expr::integer(0)),
            ),
        )]),
    );
    let main = function(&module, "main");

    assert_eq!(count(main, InstructionOpcode::ICmp), 1);
    assert_eq!(count(main, InstructionOpcode::FCmp), 1);
    assert_eq!(count(main, InstructionOpcode::And), 1);
    let text = listing(main);
    assert!(text.contains("icmp sle i32"));
    assert!(text.contains("fcmp ogt double"));
    assert!(text.contains("and i1"));
}

#[test]
fn test_pointers_compare_as_addresses() {
    let context = Context::create();
    let module = lower(
        &context,
        Program::new(
            "pointers",
            vec![
                Local::variables(&["p"], Type::pointer(Type::Integer)),
                Local::variables(&["b"], Type::Boolean),
            ],
            vec![Stmt::assign(
                Expr::symbol("b"),
                Expr::binary(Expr::symbol("p"), BinaryOperator::Equals, Expr::nil()),
            )],
        ),
    );
    let main = function(&module, "main");

    // The nil side folds to a constant.
    assert_eq!(count(main, InstructionOpcode::PtrToInt), 1);
    assert!(listing(main).contains("icmp eq i64"));
}

#[test]
fn test_program_variables_are_globals_and_routine_variables_are_stack_slots() {
    let context = Context::create();
    let square = Local::routine(
        Header::function("square", vec![Formal::by_value(&["n"], Type::Integer)], Type::Integer),
        vec![Local::variables(&["tmp"], Type::Integer)],
        vec![
            Stmt::assign(
                Expr::symbol("tmp"),
                Expr::binary(Expr::symbol("n"), BinaryOperator::Star, Expr::symbol("n")),
            ),
            Stmt::assign(Expr::symbol("square"), Expr::symbol("tmp")),
        ],
    );
    let module = lower(
        &context,
        Program::new(
            "slots",
            vec![Local::variables(&["x"], Type::Integer), square],
            vec![Stmt::assign(
                Expr::symbol("x"),
                Expr::call("square", vec![Expr::integer(4)]),
            )],
        ),
    );

    assert!(module.get_global("x").is_some());
    assert!(module.get_global("n").is_none());
    assert!(module.get_global("tmp").is_none());

    let square = function(&module, "square");
    assert_eq!(square.count_params(), 1);
    let text = listing(square);
    assert!(text.contains("%n = alloca i32"));
    assert!(text.contains("%tmp = alloca i32"));
    assert!(text.contains("%result = alloca i32"));

    let entry = square.get_first_basic_block().unwrap();
    let allocas = instructions(square)
        .into_iter()
        .filter(|instruction| instruction.get_opcode() == InstructionOpcode::Alloca)
        .collect::<Vec<_>>();
    assert_eq!(allocas.len(), 3);
    assert!(allocas
        .iter()
        .all(|alloca| alloca.get_parent() == Some(entry)));
    assert!(listing(function(&module, "main")).contains("call i32 @square(i32 4)"));
}

#[test]
fn test_formal_read_after_recursive_call_uses_own_frame() {
    let context = Context::create();
    let fact = Local::routine(
        Header::function("fact", vec![Formal::by_value(&["n"], Type::Integer)], Type::Integer),
        vec![],
        vec![Stmt::if_else(
            Expr::binary(Expr::symbol("n"), BinaryOperator::LessEquals, Expr::integer(1)),
            Stmt::assign(Expr::symbol("fact"), Expr::integer(1)),
            Stmt::assign(
                Expr::symbol("fact"),
                Expr::binary(
                    Expr::call(
                        "fact",
                        vec![Expr::binary(Expr::symbol("n"), BinaryOperator::Minus, Expr::integer(1))],
                    ),
                    BinaryOperator::Star,
                    Expr::symbol("n"),
                ),
            ),
        )],
    );
    let module = lower(&context, Program::new("fact", vec![fact], vec![]));
    let fact = function(&module, "fact");
    let entry = fact.get_first_basic_block().unwrap();

    let all = instructions(fact);
    let call = all
        .iter()
        .position(|instruction| instruction.get_opcode() == InstructionOpcode::Call)
        .unwrap();
    let load = all[call..]
        .iter()
        .find(|instruction| instruction.get_opcode() == InstructionOpcode::Load)
        .unwrap();
    let slot = load
        .get_operand(0)
        .and_then(|operand| operand.left())
        .unwrap()
        .into_pointer_value()
        .as_instruction()
        .unwrap();
    assert_eq!(slot.get_opcode(), InstructionOpcode::Alloca);
    assert_eq!(slot.get_parent(), Some(entry));
    assert_eq!(module.get_globals().count(), 0);
}

#[test]
fn test_function_returns_its_result_slot() {
    let context = Context::create();
    let constant = Local::routine(
        Header::function("answer", vec![], Type::Integer),
        vec![],
        vec![Stmt::assign(Expr::result(), Expr::integer(42))],
    );
    let module = lower(
        &context,
        Program::new(
            "answer",
            vec![constant],
            vec![Stmt::call("writeInteger", vec![Expr::call("answer", vec![])])],
        ),
    );
    let answer = function(&module, "answer");

    let ret = answer
        .get_last_basic_block()
        .unwrap()
        .get_terminator()
        .unwrap();
    assert_eq!(ret.get_opcode(), InstructionOpcode::Return);
    let returned = ret
        .get_operand(0)
        .and_then(|operand| operand.left())
        .unwrap()
        .into_int_value()
        .as_instruction()
        .unwrap();
    assert_eq!(returned.get_opcode(), InstructionOpcode::Load);
    assert!(listing(answer).contains("store i32 42, i32* %result"));
}

#[test]
fn test_reference_arguments_pass_addresses() {
    let context = Context::create();
    let increment = Local::routine(
        Header::procedure("increment", vec![Formal::by_reference(&["n"], Type::Integer)]),
        vec![],
        vec![Stmt::assign(
            Expr::symbol("n"),
            Expr::binary(Expr::symbol("n"), BinaryOperator::Plus, Expr::integer(1)),
        )],
    );
    let module = lower(
        &context,
        Program::new(
            "references",
            vec![Local::variables(&["x"], Type::Integer), increment],
            vec![Stmt::call("increment", vec![Expr::symbol("x")])],
        ),
    );

    assert!(listing(function(&module, "main")).contains("call void @increment(i32* @x)"));

    // The slot holds the address, so every access loads it first.
    let increment = function(&module, "increment");
    assert!(listing(increment).contains("%n = alloca i32*"));
    assert_eq!(count(increment, InstructionOpcode::Load), 3);
    assert!(increment.get_type().get_return_type().is_none());
}

#[test]
fn test_sized_array_by_value_is_copied() {
    let context = Context::create();
    let first = Local::routine(
        Header::function(
            "first",
            vec![Formal::by_value(&["a"], Type::array(Type::Integer, Some(3)))],
            Type::Integer,
        ),
        vec![],
        vec![Stmt::assign(
            Expr::symbol("first"),
            Expr::index(Expr::symbol("a"), Expr::integer(0)),
        )],
    );
    let module = lower(
        &context,
        Program::new(
            "arrays",
            vec![
                Local::variables(&["v"], Type::array(Type::Integer, Some(3))),
                first,
            ],
            vec![Stmt::call(
                "writeInteger",
                vec![Expr::call("first", vec![Expr::symbol("v")])],
            )],
        ),
    );

    assert!(listing(function(&module, "main")).contains("call i32 @first([3 x i32]* @v)"));

    let first = function(&module, "first");
    let text = listing(first);
    assert!(text.contains("%a = alloca [3 x i32]"));
    assert!(text.contains("load [3 x i32], [3 x i32]* %0"));
    assert_eq!(count(first, InstructionOpcode::GetElementPtr), 1);
}

#[test]
fn test_string_literals_pass_as_addresses() {
    let context = Context::create();
    let module = lower(
        &context,
        integer_program(vec![Stmt::call("writeString", vec![Expr::string("hello")])]),
    );

    assert!(listing(function(&module, "main")).contains("call void @writeString(i8* getelementptr"));
    assert!(module
        .print_to_string()
        .to_string()
        .contains("c\"hello\\00\""));
}

#[test]
fn test_library_routines_are_external() {
    let context = Context::create();
    let module = lower(&context, integer_program(vec![]));

    let externals = module
        .get_functions()
        .filter(|function| function.count_basic_blocks() == 0)
        .count();
    assert_eq!(externals, 24);

    let read_string = function(&module, "readString");
    assert_eq!(read_string.count_params(), 2);
    assert!(read_string.get_type().get_return_type().is_none());
    assert!(listing(read_string).contains("declare void @readString(i32, i8*)"));
    assert!(listing(function(&module, "sqrt")).contains("declare double @sqrt(double)"));
}

#[test]
fn test_labels_and_goto_become_blocks() {
    let context = Context::create();
    let module = lower(
        &context,
        Program::new(
            "labels",
            vec![Local::variables(&["x"], Type::Integer), Local::labels(&["L"])],
            vec![
                Stmt::goto("L"),
                Stmt::assign(Expr::symbol("x"), Expr::integer(0)),
                Stmt::labeled("L", Stmt::assign(Expr::symbol("x"), Expr::integer(1))),
            ],
        ),
    );
    let main = function(&module, "main");

    let label = block_named(main, "label.L");
    let skipped = block_named(main, "aftergoto");
    assert_eq!(successors(main.get_first_basic_block().unwrap()), vec![label]);
    assert_eq!(successors(skipped), vec![label]);
    assert!(!reachable(main).contains(&skipped));
}

#[test]
fn test_return_ends_main_with_zero() {
    let context = Context::create();
    let module = lower(
        &context,
        integer_program(vec![
            Stmt::ret(),
            Stmt::assign(Expr::symbol("i"), Expr::integer(1)),
        ]),
    );
    let main = function(&module, "main");

    let ret = main.get_first_basic_block().unwrap().get_terminator().unwrap();
    assert_eq!(ret.get_opcode(), InstructionOpcode::Return);
    assert!(listing(main).contains("ret i32 0"));
    let dead = block_named(main, "afterreturn");
    assert!(!reachable(main).contains(&dead));
}

#[test]
fn test_new_and_dispose() {
    let context = Context::create();
    let module = lower(
        &context,
        Program::new(
            "heap",
            vec![
                Local::variables(&["p"], Type::pointer(Type::Integer)),
                Local::variables(&["q"], Type::pointer(Type::array(Type::Real, None))),
            ],
            vec![
                Stmt::new_single(Expr::symbol("p")),
                Stmt::new_array(Expr::integer(8), Expr::symbol("q")),
                Stmt::dispose(Expr::symbol("p")),
                Stmt::dispose_array(Expr::symbol("q")),
            ],
        ),
    );
    let main = function(&module, "main");

    assert!(module.get_function("malloc").is_some());
    assert!(module.get_function("free").is_some());
    let frees = instructions(main)
        .iter()
        .filter(|instruction| {
            instruction.get_opcode() == InstructionOpcode::Call
                && instruction.print_to_string().to_string().contains("@free")
        })
        .count();
    assert_eq!(frees, 2);

    let text = listing(main);
    assert!(text.contains("store i32* null, i32** @p"));
    assert!(text.contains("store double* null, double** @q"));
}

#[test]
fn test_nested_routine_receives_enclosing_slots() {
    let context = Context::create();
    let bump = Local::routine(
        Header::procedure("bump", vec![]),
        vec![],
        vec![Stmt::assign(
            Expr::symbol("count"),
            Expr::binary(Expr::symbol("count"), BinaryOperator::Plus, Expr::integer(1)),
        )],
    );
    let outer = Local::routine(
        Header::procedure("outer", vec![]),
        vec![Local::variables(&["count"], Type::Integer), bump],
        vec![
            Stmt::assign(Expr::symbol("count"), Expr::integer(0)),
            Stmt::call("bump", vec![]),
        ],
    );
    let module = lower(
        &context,
        Program::new("nested", vec![outer], vec![Stmt::call("outer", vec![])]),
    );

    let bump = function(&module, "bump");
    assert_eq!(bump.count_params(), 1);
    assert_eq!(count(bump, InstructionOpcode::Alloca), 0);
    assert!(listing(function(&module, "outer")).contains("call void @bump(i32* %count)"));
}

#[test]
fn test_mutual_recursion_through_forward() {
    let context = Context::create();
    let module = lower(
        &context,
        Program::new(
            "mutual",
            vec![
                Local::forward(Header::procedure("b", vec![])),
                Local::routine(Header::procedure("a", vec![]), vec![], vec![Stmt::call("b", vec![])]),
                Local::routine(Header::procedure("b", vec![]), vec![], vec![Stmt::call("a", vec![])]),
            ],
            vec![Stmt::call("a", vec![])],
        ),
    );

    assert!(module.get_function("b.1").is_none());
    assert!(function(&module, "b").count_basic_blocks() > 0);
    assert!(listing(function(&module, "a")).contains("call void @b()"));
    assert!(listing(function(&module, "b")).contains("call void @a()"));
}

#[test]
fn test_routine_names_are_unique() {
    let context = Context::create();
    let helper = |value: i32| {
        Local::routine(
            Header::procedure("helper", vec![]),
            vec![],
            vec![Stmt::call("writeInteger", vec![Expr::integer(value)])],
        )
    };
    let outer = Local::routine(Header::procedure("outer", vec![]), vec![helper(1)], vec![Stmt::call("helper", vec![])]);
    let other = Local::routine(Header::procedure("other", vec![]), vec![helper(2)], vec![Stmt::call("helper", vec![])]);
    let main = Local::routine(Header::procedure("main", vec![]), vec![], vec![]);

    let module = lower(
        &context,
        Program::new(
            "names",
            vec![outer, other, main],
            vec![Stmt::call("outer", vec![]), Stmt::call("main", vec![])],
        ),
    );

    let mut names = module
        .get_functions()
        .filter(|function| function.count_basic_blocks() > 0)
        .map(|function| function.get_name().to_str().unwrap().to_string())
        .collect::<Vec<String>>();
    names.sort();
    assert_eq!(names, vec!["helper", "helper.1", "main", "main.1", "other", "outer"]);
    assert!(listing(function(&module, "other")).contains("call void @helper.1()"));
    assert!(listing(function(&module, "main")).contains("call void @main.1()"));
}

#[test]
fn test_unannotated_tree_is_rejected() {
    let context = Context::create();
    let program = integer_program(vec![Stmt::assign(Expr::symbol("i"), Expr::integer(1))]);

    let error = compile(&context, &program, "raw").unwrap_err();
    assert_eq!(error.get_error_name(), "LoweringInvariant");
}

#[test]
fn test_analysis_errors_stop_the_pipeline() {
    let context = Context::create();
    let mut program = integer_program(vec![Stmt::assign(Expr::symbol("i"), Expr::real(1.5))]);

    let error = compile_program(&context, &mut program, &CompileOptions::default()).unwrap_err();
    assert_eq!(error.get_error_name(), "AssignmentTypeMismatch");
}
